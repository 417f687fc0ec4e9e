use std::io::stdout;

use clap::{crate_version, App, AppSettings, Arg, ArgMatches, Shell, SubCommand};
use stdinout::OrExit;

mod progress;

mod subcommands;

mod traits;
pub use self::traits::{TarteApp, TarteConfigApp};

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
    AppSettings::SubcommandRequiredElseHelp,
];

static QUIET: &str = "QUIET";
static VERBOSE: &str = "VERBOSE";

fn main() {
    // Known subapplications.
    let apps = vec![
        subcommands::DatasetApp::app(),
        subcommands::TagApp::app(),
        subcommands::TrainApp::app(),
    ];

    let cli = App::new("tarte")
        .settings(DEFAULT_CLAP_SETTINGS)
        .about("Lemma disambiguation")
        .version(crate_version!())
        .arg(
            Arg::with_name(QUIET)
                .short("q")
                .long("quiet")
                .help("Silence log messages"),
        )
        .arg(
            Arg::with_name(VERBOSE)
                .short("v")
                .multiple(true)
                .help("Increase log verbosity (-v, -vv)"),
        )
        .subcommands(apps)
        .subcommand(
            SubCommand::with_name("completions")
                .about("Generate completion scripts for your shell")
                .setting(AppSettings::ArgRequiredElseHelp)
                .arg(Arg::with_name("shell").possible_values(&Shell::variants())),
        );
    let matches = cli.clone().get_matches();

    setup_logging(&matches);

    match matches.subcommand_name().unwrap() {
        "completions" => {
            let shell = matches
                .subcommand_matches("completions")
                .unwrap()
                .value_of("shell")
                .unwrap();
            write_completion_script(cli, shell.parse::<Shell>().unwrap());
        }
        "dataset" => {
            subcommands::DatasetApp::parse(matches.subcommand_matches("dataset").unwrap()).run()
        }
        "tag" => subcommands::TagApp::parse(matches.subcommand_matches("tag").unwrap()).run(),
        "train" => subcommands::TrainApp::parse(matches.subcommand_matches("train").unwrap()).run(),
        _unknown => unreachable!(),
    }
}

fn setup_logging(matches: &ArgMatches) {
    // Info messages are shown by default.
    let verbosity = 2 + matches.occurrences_of(VERBOSE) as usize;

    stderrlog::new()
        .quiet(matches.is_present(QUIET))
        .verbosity(verbosity)
        .init()
        .or_exit("Cannot initialize logging", 1);
}

fn write_completion_script(mut cli: App, shell: Shell) {
    cli.gen_completions_to("tarte", shell, &mut stdout());
}
