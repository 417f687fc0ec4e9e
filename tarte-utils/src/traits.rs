use std::fs::File;

use clap::{crate_version, App, AppSettings, Arg, ArgMatches};
use stdinout::OrExit;
use tarte::{Config, TomlRead};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
];

pub trait TarteApp {
    fn app() -> App<'static, 'static>;

    fn parse(matches: &ArgMatches) -> Self;

    fn run(&self);
}

pub trait TarteConfigApp: TarteApp {
    const CONFIG: &'static str = "CONFIG";

    fn config_app<'a, 'b>(name: &str) -> App<'a, 'b> {
        App::new(name)
            .settings(DEFAULT_CLAP_SETTINGS)
            .version(crate_version!())
            .arg(
                Arg::with_name(Self::CONFIG)
                    .help("Tarte configuration")
                    .index(1)
                    .required(true),
            )
    }

    /// Read the configuration, resolving paths relative to its location.
    fn load_config(path: &str) -> Config {
        let config_file = File::open(path).or_exit(
            format!("Cannot open configuration file '{}'", path),
            1,
        );
        let mut config =
            Config::from_toml_read(config_file).or_exit("Cannot parse configuration", 1);
        config
            .relativize_paths(path)
            .or_exit("Cannot relativize paths in configuration", 1);

        config
    }
}
