use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    rc::Rc,
};

/// `Source` is a script's text along with the name it was
/// loaded under. That may be a file on disk, a message-box
/// command typed by the user, or the text handed over by an
/// include callback. Sources without a path are named
/// `./source`.
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub contents: String,
    pub path: PathBuf,
}

impl Source {
    /// Creates a new `Source` given both an `&str` and a
    /// path. The path is only used as a name for
    /// diagnostics, it is never read.
    pub fn new(source: &str, path: &Path) -> Rc<Source> {
        Rc::new(Source {
            contents: source.to_string(),
            path: path.to_owned(),
        })
    }

    /// Build a `Source` by reading a script from disk.
    pub fn path(path: &Path) -> std::io::Result<Rc<Source>> {
        let mut source = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut source)?;

        Ok(Source::new(&source, path))
    }

    /// Build a `Source` from a bare string.
    /// Note that this source will be named `./source`.
    pub fn source(source: &str) -> Rc<Source> {
        Source::new(source, &PathBuf::from("./source"))
    }

    /// The name diagnostics refer to this source by.
    pub fn name(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}
