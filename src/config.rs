/// Interpreter settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Calls nested deeper than this throw a `RangeError`.
    pub max_call_depth: usize,
    /// Print `console.log` lines to stdout instead of capturing them.
    pub echo_console: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
            echo_console: false,
        }
    }
}
