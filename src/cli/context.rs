use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Process-wide output settings, fixed once the arguments are parsed.
#[derive(Debug, Clone)]
pub struct OutputContext {
    pub out_dir: PathBuf,
    pub json: bool,
    pub quiet: bool,
}

static CONTEXT: OnceLock<OutputContext> = OnceLock::new();

/// Initialize the global output settings.
/// The first call wins; later calls are ignored.
pub fn init(context: OutputContext) {
    let _ = CONTEXT.set(context);
}

fn get() -> Option<&'static OutputContext> {
    CONTEXT.get()
}

/// Directory artifacts are written to.
pub fn out_dir() -> &'static Path {
    get().map(|c| c.out_dir.as_path()).unwrap_or(Path::new("."))
}

/// Machine-readable output requested.
pub fn json() -> bool {
    get().is_some_and(|c| c.json)
}

/// Human output suppressed except for errors. JSON mode implies quiet.
pub fn quiet() -> bool {
    get().is_some_and(|c| c.quiet || c.json)
}
