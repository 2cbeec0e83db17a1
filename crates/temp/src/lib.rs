//! Temporary files and directories that delete themselves on drop.
//!
//! Used by the cache store for atomic writes: a result is written to a
//! `temp::File` and then renamed into place, so a reader never observes a
//! partially-written cache entry.

use std::{
    env::temp_dir,
    iter::repeat_with,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

/// Generate a unique object name in the provided directory.
fn unique(dir: &Path) -> String {
    let mut rng = fastrand::Rng::new();
    loop {
        let mut instance = String::with_capacity(16);
        repeat_with(|| rng.u8(..))
            .take(8)
            .map(|byte| format!("{byte:02x?}"))
            .for_each(|byte| instance.push_str(&byte));

        if !dir.join(&instance).exists() {
            break instance;
        }
    }
}

/// An object is something that exists in the filesystem.
pub trait Object {
    /// Create the object.
    fn create(&self) -> Result<(), std::io::Error>;

    /// Remove the object.
    fn remove(&self) -> Result<(), std::io::Error>;

    /// Get the parent of the object.
    fn path(&self) -> &Path;

    /// Get the name of the object.
    fn name(&self) -> &str;

    /// Get the full path of the object, i.e. path + name.
    fn full(&self) -> PathBuf;
}

/// A trait for Objects that can be created in the `temp::Builder`.
pub trait BuilderCreate {
    fn new(path: PathBuf, name: String) -> Self;
}

/// A temporary file.
pub struct File {
    parent: PathBuf,
    name: String,
}
impl Object for File {
    fn create(&self) -> Result<(), std::io::Error> {
        if !self.parent.exists() {
            std::fs::create_dir_all(&self.parent)?;
        }
        std::fs::File::create_new(self.parent.join(&self.name)).map(|_| ())
    }
    fn remove(&self) -> Result<(), std::io::Error> {
        let path = self.parent.join(&self.name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.parent
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn full(&self) -> PathBuf {
        self.parent.join(&self.name)
    }
}
impl BuilderCreate for File {
    fn new(path: PathBuf, name: String) -> Self {
        Self { parent: path, name }
    }
}

/// A temporary directory.
pub struct Directory {
    path: PathBuf,
    name: String,
}
impl Object for Directory {
    fn create(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(self.path.join(&self.name)).map(|_| ())
    }

    fn remove(&self) -> Result<(), std::io::Error> {
        let path = self.path.join(&self.name);
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn full(&self) -> PathBuf {
        self.path.join(&self.name)
    }
}
impl BuilderCreate for Directory {
    fn new(path: PathBuf, name: String) -> Self {
        Self { path, name }
    }
}

/// An instance of a temporary object. The object is deleted when this
/// value is dropped.
///
/// Additional temporary objects can be associated with an instance, so
/// that they are tied to the main object's lifetime and dropped together.
pub struct Temp {
    object: Box<dyn Object>,
    associated: Vec<Temp>,
}
impl Temp {
    /// Associate another temporary object with the caller. It will be
    /// dropped together with the caller.
    pub fn associate(&mut self, temp: Temp) {
        self.associated.push(temp)
    }

    /// Get the name of the temporary object.
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// Get the directory the temporary object resides in.
    pub fn path(&self) -> &Path {
        self.object.path()
    }

    /// The full path to the object, including its name.
    pub fn full(&self) -> PathBuf {
        self.object.full()
    }

    /// Rename the object to `dest`, consuming it without running its
    /// `Drop` cleanup. Used to atomically publish a finished cache entry.
    pub fn persist(mut self, dest: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let src = self.object.full();
        if let Some(parent) = dest.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&src, dest.as_ref())?;
        self.associated.clear();
        // The rename already moved the file; forget the object so `Drop`
        // doesn't try (and fail) to remove it again from its old path.
        self.object = Box::new(File {
            parent: PathBuf::new(),
            name: String::new(),
        });
        Ok(())
    }

    /// Make a symlink to the temporary object. The link is associated with
    /// the caller, so it is removed alongside it.
    pub fn link(&mut self, link: impl Into<PathBuf>) -> Result<(), std::io::Error> {
        let link = link.into();
        if let Some(parent) = link.parent()
            && let Some(name) = link.file_name()
        {
            symlink(self.object.full(), &link)?;
            self.associated.push(Temp {
                object: Box::new(File {
                    parent: parent.to_path_buf(),
                    name: name.to_string_lossy().into_owned(),
                }),
                associated: Vec::new(),
            });
            Ok(())
        } else {
            Err(std::io::ErrorKind::NotFound.into())
        }
    }
}
impl Drop for Temp {
    fn drop(&mut self) {
        let _ = self.object.remove();
    }
}
unsafe impl Send for Temp {}
unsafe impl Sync for Temp {}

/// Build a new temporary object.
///
/// ## Example
///
/// ```rust
/// use std::io::Write;
/// let temp = temp::Builder::new().create::<temp::File>().unwrap();
/// let path = temp.full();
/// let mut file = std::fs::File::open(&path).unwrap();
/// write!(file, "Hello!").unwrap();
/// drop(temp);
/// assert!(!path.exists());
/// ```
#[derive(Default)]
pub struct Builder {
    name: Option<String>,
    path: Option<PathBuf>,
    extension: Option<String>,
    make: bool,
}
impl Builder {
    /// Create a new Builder.
    pub fn new() -> Self {
        Self {
            make: true,
            ..Default::default()
        }
    }

    /// The directory the temporary object should reside in.
    /// If not set, defaults to the system temp directory.
    pub fn within(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The name of the temporary object. If not set, uses a randomized,
    /// unique string.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an optional extension on the object.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Whether to create the object on `create()`. By default the object
    /// is created.
    pub fn make(mut self, make_object: bool) -> Self {
        self.make = make_object;
        self
    }

    /// Create the object, consuming the Builder.
    ///
    /// ## Examples
    ///
    /// Create a new temporary file:
    ///
    /// ```rust
    /// let file = temp::Builder::new().within(std::env::temp_dir()).name("new_file").create::<temp::File>().unwrap();
    /// assert!(file.full().exists());
    /// ```
    pub fn create<T: BuilderCreate + Object + 'static>(self) -> Result<Temp, std::io::Error> {
        let parent = self.path.unwrap_or(temp_dir());
        let mut name = self.name.unwrap_or(unique(&parent));

        if let Some(extension) = &self.extension {
            name.push_str(&format!(".{extension}"));
        }

        let object = T::new(parent, name);
        if self.make {
            object.create()?;
        }
        Ok(Temp {
            object: Box::new(object),
            associated: Vec::new(),
        })
    }
}
