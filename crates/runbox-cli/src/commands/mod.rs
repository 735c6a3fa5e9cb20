//! Subcommand implementations

pub mod check;
pub mod health;
pub mod run;
pub mod sweep;

use crate::args::SourceArgs;
use anyhow::{Context, bail};
use std::io::Read;

/// Resolve the guest code from a file, `-` (stdin) or `--code`
pub fn read_source(source: &SourceArgs) -> anyhow::Result<String> {
    match (&source.code, &source.file) {
        (Some(code), _) => Ok(code.clone()),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut code = String::new();
            std::io::stdin()
                .read_to_string(&mut code)
                .context("failed to read code from stdin")?;
            Ok(code)
        }
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        (None, None) => bail!("no code given; pass a file, `-` or --code"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_source_prefers_inline_code() {
        let source = SourceArgs {
            file: None,
            code: Some("x = 1".into()),
        };
        assert_eq!(read_source(&source).unwrap(), "x = 1");
    }

    #[test]
    fn test_read_source_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "print('hi')").unwrap();
        let source = SourceArgs {
            file: Some(file.path().to_path_buf()),
            code: None,
        };
        assert_eq!(read_source(&source).unwrap(), "print('hi')");
    }

    #[test]
    fn test_read_source_requires_input() {
        let source = SourceArgs {
            file: None,
            code: None,
        };
        assert!(read_source(&source).is_err());
    }
}
