use anyhow::{Context, Result};
use clap::{App, Arg};
use quire::config::BuildConfig;
use quire::log;

fn main() {
    if let Err(e) = run() {
        log!("error"; "{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("quire")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a static site from layouts, posts and pages")
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Print nothing but errors"),
        )
        .arg(
            Arg::with_name("ignore")
                .short("i")
                .long("ignore")
                .value_name("PATTERN")
                .help("Skip entries whose name matches PATTERN (a regex)")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("SOURCE")
                .help("The site's source directory")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("DESTINATION")
                .help("Where the generated site is written")
                .required(true)
                .index(2),
        )
        .get_matches();

    // Both are required, so clap has already rejected missing values.
    let source = matches.value_of("SOURCE").unwrap_or_default();
    let destination = matches.value_of("DESTINATION").unwrap_or_default();
    let ignore: Vec<&str> = matches
        .values_of("ignore")
        .map(|values| values.collect())
        .unwrap_or_default();

    let config = BuildConfig::load(source, destination)
        .context("Loading configuration")?
        .with_ignore(ignore)
        .quiet(matches.is_present("quiet"));
    quire::build(&config).context("Building site")?;
    Ok(())
}
