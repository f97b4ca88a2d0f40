//! Command-line options.

use clap::Parser;

/// Generate Jasmin assembly for the JVM from a textual IR module.
#[derive(Parser, Debug)]
#[command(name = "lljvm-backend", version, about)]
pub struct Options {
    /// Input IR listing ('-' reads stdin)
    #[arg(default_value = "-", value_name = "input")]
    pub input: String,

    /// Binary name of the generated class (dots become package
    /// separators); defaults to the input basename
    #[arg(long, value_name = "binary.name")]
    pub classname: Option<String>,

    /// Debugging level: 0 none, 1 source/line info (default), 2 adds
    /// local variable info, 3 adds commented IR. Bare -g means -g2.
    #[arg(
        short = 'g',
        value_name = "level",
        num_args = 0..=1,
        default_value_t = 1,
        default_missing_value = "2"
    )]
    pub debug: u32,
}

impl Options {
    pub fn from_args() -> Self {
        Options::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::parse_from(["lljvm-backend"]);
        assert_eq!(opts.input, "-");
        assert_eq!(opts.debug, 1);
        assert!(opts.classname.is_none());
    }

    #[test]
    fn bare_g_means_g2() {
        let opts = Options::parse_from(["lljvm-backend", "-g", "in.ll"]);
        assert_eq!(opts.debug, 2);
        assert_eq!(opts.input, "in.ll");
    }

    #[test]
    fn attached_debug_level() {
        let opts = Options::parse_from(["lljvm-backend", "-g3", "--classname", "org.example.Foo"]);
        assert_eq!(opts.debug, 3);
        assert_eq!(opts.classname.as_deref(), Some("org.example.Foo"));
    }
}
