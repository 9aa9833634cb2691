use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("mendlink")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("mendlink")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("check")
                .about(
                    "Run one scan cycle over an exported site directory: probe every link, \
                rewrite broken ones in place.",
                )
                .arg(
                    arg!([DIR])
                        .required(false)
                        .help("The exported site directory to scan")
                        .default_value("out"),
                )
                .arg(
                    arg!(-b --"base-url" <URL>)
                        .required(false)
                        .help("The site's own origin; links to other hosts are treated as cross-origin")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to a JSON config file (defaults apply for missing fields)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-t --"concurrency" <NUM_PROBES>)
                        .required(false)
                        .help("Upper bound on simultaneous link probes")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-probe request timeout in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"dry-run")
                        .required(false)
                        .help("Probe and report but leave files untouched")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("watch")
                .about(
                    "Scan once at startup, then rescan on a fixed interval. Type 'r' for a \
                manual recheck, 'q' to quit.",
                )
                .arg(
                    arg!([DIR])
                        .required(false)
                        .help("The exported site directory to watch")
                        .default_value("out"),
                )
                .arg(
                    arg!(-i --"interval" <MINUTES>)
                        .required(false)
                        .help("Minutes between periodic rescans")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-b --"base-url" <URL>)
                        .required(false)
                        .help("The site's own origin; links to other hosts are treated as cross-origin")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to a JSON config file (defaults apply for missing fields)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("deploy")
                .about(
                    "Build, export and push the site to the hosting provider. Only the final \
                deploy step is retried.",
                )
                .arg(
                    arg!([DIR])
                        .required(false)
                        .help("The project directory containing the marker config file")
                        .default_value("."),
                )
                .arg(
                    arg!(--"publish-dir" <PATH>)
                        .required(false)
                        .help("Directory of exported assets handed to the provider CLI")
                        .default_value("out"),
                )
                .arg(
                    arg!(--"package-manager" <NAME>)
                        .required(false)
                        .help("Package manager used for install/build/export")
                        .default_value("npm"),
                ),
        )
}
