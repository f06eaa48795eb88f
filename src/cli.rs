use crate::{Error, Result};

/// Options shared by the `run` and `setup` commands; values are `None`
/// when not provided on the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub device: Option<String>,
    pub config_path: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Setup(RunOptions),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        if args.is_empty() {
            return Ok(Command::Run(RunOptions::default()));
        }

        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            Some("run") => Ok(Command::Run(parse_options(&mut iter)?)),
            Some("setup") => Ok(Command::Setup(parse_options(&mut iter)?)),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // Allow omitting the explicit `run` subcommand: pass the consumed flag plus the
                // remaining args into the option parser.
                let mut flags: Vec<String> = Vec::with_capacity(args.len());
                flags.push(flag.to_string());
                flags.extend(iter.map(|s| s.to_string()));
                let mut iter = flags.iter();
                Ok(Command::Run(parse_options(&mut iter)?))
            }
            Some(cmd) => Err(Error::Config(format!(
                "unknown command '{cmd}', try --help"
            ))),
            None => Ok(Command::Run(RunOptions::default())),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "signwx - weather and alert daemon for BetaBrite serial LED signs\n",
            "\n",
            "USAGE:\n",
            "  signwx run [--device <path>] [--config <path>] [--log-level <level>] [--log-file <path>]\n",
            "  signwx setup [--config <path>]\n",
            "  signwx --help\n",
            "  signwx --version\n",
            "\n",
            "OPTIONS:\n",
            "  --device <path>      Serial device path (default: from config)\n",
            "  --config <path>      Settings file (default: ~/.signwx/config.json)\n",
            "  --log-level <level>  error, warn, info, debug or trace (default: info)\n",
            "  --log-file <path>    Append logs to this file as well as stderr\n",
            "  -h, --help           Show this help\n",
            "  -V, --version        Show version\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--device" => {
                opts.device = Some(take_value(flag, iter)?);
            }
            "--config" => {
                opts.config_path = Some(take_value(flag, iter)?);
            }
            "--log-level" => {
                opts.log_level = Some(take_value(flag, iter)?);
            }
            "--log-file" => {
                opts.log_file = Some(take_value(flag, iter)?);
            }
            other => {
                return Err(Error::Config(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::Config(format!("expected a value after {flag}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_with_no_args() {
        let args: Vec<String> = vec![];
        let cmd = Command::parse(&args).unwrap();
        assert_eq!(cmd, Command::Run(RunOptions::default()));
    }

    #[test]
    fn parse_run_with_overrides() {
        let args = vec![
            "run".into(),
            "--device".into(),
            "/dev/ttyUSB0".into(),
            "--config".into(),
            "/tmp/signwx.json".into(),
            "--log-level".into(),
            "debug".into(),
            "--log-file".into(),
            "/tmp/signwx.log".into(),
        ];
        let expected = RunOptions {
            device: Some("/dev/ttyUSB0".into()),
            config_path: Some("/tmp/signwx.json".into()),
            log_level: Some("debug".into()),
            log_file: Some("/tmp/signwx.log".into()),
        };
        let cmd = Command::parse(&args).unwrap();
        assert_eq!(cmd, Command::Run(expected));
    }

    #[test]
    fn parse_run_allows_implicit_subcommand() {
        let args = vec!["--device".into(), "/dev/ttyS1".into()];
        let expected = RunOptions {
            device: Some("/dev/ttyS1".into()),
            ..RunOptions::default()
        };
        let cmd = Command::parse(&args).unwrap();
        assert_eq!(cmd, Command::Run(expected));
    }

    #[test]
    fn parse_setup_subcommand() {
        let args = vec!["setup".into(), "--config".into(), "/tmp/s.json".into()];
        let cmd = Command::parse(&args).unwrap();
        assert_eq!(
            cmd,
            Command::Setup(RunOptions {
                config_path: Some("/tmp/s.json".into()),
                ..RunOptions::default()
            })
        );
    }

    #[test]
    fn parse_help_and_version() {
        assert_eq!(
            Command::parse(&["--help".to_string()]).unwrap(),
            Command::ShowHelp
        );
        assert_eq!(
            Command::parse(&["-V".to_string()]).unwrap(),
            Command::ShowVersion
        );
    }

    #[test]
    fn parse_rejects_unknown_flag_and_command() {
        let err = Command::parse(&["--nope".to_string()]).unwrap_err();
        assert!(format!("{err}").contains("unknown flag"));
        let err = Command::parse(&["weather".to_string()]).unwrap_err();
        assert!(format!("{err}").contains("unknown command"));
    }
}
