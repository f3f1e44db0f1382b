mod error;
mod compose;
mod application;
#[cfg(feature = "service")]
mod service;

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;


const VERSION: &'static str = env!("CARGO_PKG_VERSION");
const AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");


fn compose_args(cmd: Command) -> Command {
    cmd
        .arg(
            Arg::new("style")
            .long("style")
            .help("hud style, can be \"classic\" or \"minimal\"; default is \"classic\"")
        )
        .arg(
            Arg::new("assets")
            .long("assets")
            .help("folder holding the hud images; default is <exe dir>/assets")
        )
        .arg(
            Arg::new("config")
            .short('c')
            .long("config")
            .help("json config file; command line options take precedence")
        )
        .arg(
            Arg::new("filter")
            .long("filter")
            .help("filter used in scale, can be \"nearest\", \"triangle\", \"gaussian\", \"catmullrom\", \"lanczos3\"; default is \"triangle\"")
        )
        .arg(
            Arg::new("native")
            .long("native")
            .help("keep the photo's own size instead of 1080x1920")
            .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("base64")
            .long("base64")
            .help("write a base64 data url instead of png bytes")
            .action(ArgAction::SetTrue)
        )
}

fn build_cli() -> Command {
    let app =
        Command::new("story hud compositor")
        .version(VERSION)
        .author(AUTHORS)
        .subcommand(
            compose_args(Command::new("compose"))
            .about("put the hud over a single photo")
            .arg(
                Arg::new("input")
                .short('i')
                .long("input")
                .help("input photo")
                .required(true)
            )
            .arg(
                Arg::new("output")
                .short('o')
                .long("output")
                .help("output file")
                .required(true)
            )
        )
        .subcommand(
            compose_args(Command::new("batch"))
            .about("put the hud over every photo in a folder")
            .arg(
                Arg::new("input_dir")
                .short('i')
                .long("input_dir")
                .help("input folder")
                .required(true)
            )
            .arg(
                Arg::new("output_dir")
                .short('o')
                .long("output_dir")
                .help("output folder")
                .required(true)
            )
            .arg(
                Arg::new("thread")
                .short('t')
                .long("thread")
                .help("multi-thread: thread number, at most 16")
                .value_parser(clap::value_parser!(usize))
            )
        );
    #[cfg(feature = "service")]
    let app = app.subcommand(
        compose_args(Command::new("serve"))
        .about("serve the upload page and POST /compose")
        .arg(
            Arg::new("host")
            .long("host")
            .help("listen address, default is 0.0.0.0:8080")
        )
        .arg(
            Arg::new("workers")
            .long("workers")
            .help("http worker number, default is the cpu count")
            .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("max_tasks")
            .long("max_tasks")
            .help("compositions in flight before answering 429")
            .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("web")
            .long("web")
            .help("folder holding index.html and index.js; default is <exe dir>/web")
        )
        .arg(
            Arg::new("compress")
            .long("compress")
            .help("compress responses")
            .action(ArgAction::SetTrue)
        )
    );
    app
}

fn app_options(args: &ArgMatches) -> Result<application::AppOptions, String> {
    use compose::output::OutputMode;

    let mut options = application::AppOptions::default();
    if let Some(config) = args.get_one::<String>("config") {
        options.load_config(Path::new(config)).map_err(|e| format!("config {}: {}", config, e))?;
    }
    if let Some(assets) = args.get_one::<String>("assets") {
        options.set_asset_folder(assets);
    }
    if let Some(style) = args.get_one::<String>("style") {
        options.set_style(style.parse()?);
    }
    if let Some(filter) = args.get_one::<String>("filter") {
        if !options.compose_options_mut().set_filter(filter) {
            return Err(format!("unknown filter `{}`", filter));
        }
    }
    if args.get_flag("native") {
        options.compose_options_mut().set_sizing(compose::SizingPolicy::Native);
    }
    if args.get_flag("base64") {
        options.set_output_mode(OutputMode::Base64);
    }
    Ok(options)
}

fn run(name: &str, args: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    match name {
        "compose" => {
            let options = app_options(args)?;
            let input = PathBuf::from(args.get_one::<String>("input").ok_or("missing input")?);
            let output = PathBuf::from(args.get_one::<String>("output").ok_or("missing output")?);
            let app = application::Application::new(options);
            let time = Instant::now();
            app.compose_one(&input, &output)?;
            log::info!("> {} written, used {}ms", output.display(), time.elapsed().as_millis());
        },

        "batch" => {
            let mut options = app_options(args)?;
            if let Some(thread) = args.get_one::<usize>("thread") {
                options.set_thread_num(*thread);
            }
            let input = PathBuf::from(args.get_one::<String>("input_dir").ok_or("missing input_dir")?);
            let output = PathBuf::from(args.get_one::<String>("output_dir").ok_or("missing output_dir")?);
            if !output.is_dir() {
                std::fs::create_dir_all(output.as_path())?;
            }
            let app = Arc::new(application::Application::new(options));
            let time = Instant::now();
            let list = app.list_files(&input, &output);
            let total = list.len();
            let failed = application::Application::alloc_tasks(app, list)?;
            log::info!("> {}/{} composed, used {}ms", total.saturating_sub(failed), total, time.elapsed().as_millis());
            if failed > 0 {
                return Err(format!("{} of {} photos failed", failed, total).into());
            }
        },

        #[cfg(feature = "service")]
        "serve" => {
            let options = app_options(args)?;
            log::info!("hud assets from {}", options.asset_folder().display());
            let mut server_options = service::ComposeServerOptions::default();
            if let Some(host) = args.get_one::<String>("host") {
                server_options.set_host(host);
            }
            if let Some(workers) = args.get_one::<usize>("workers") {
                server_options.set_workers(*workers);
            }
            if let Some(max_tasks) = args.get_one::<usize>("max_tasks") {
                server_options.set_max_tasks(*max_tasks);
            }
            if let Some(web) = args.get_one::<String>("web") {
                server_options.set_web_folder(web);
            }
            server_options.set_compress(args.get_flag("compress"));
            server_options.set_output_mode(options.output_mode());
            service::ComposeService::new(server_options, options.into_compositor()).start()?;
        },

        _ => {

        }
    }
    Ok(())
}

fn main() -> ExitCode {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut app = build_cli();
    let matches = app.clone().get_matches();
    let (name, args) = match matches.subcommand() {
        Some(v) => v,
        None => {
            let _ = app.print_help();
            return ExitCode::SUCCESS;
        }
    };
    match run(name, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{} failed: {}", name, e);
            ExitCode::FAILURE
        }
    }
}


#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_cli_parse() {
        build_cli().debug_assert();
        let matches = build_cli().try_get_matches_from(vec![
            "story_hud", "compose", "-i", "photo.jpg", "-o", "out.png", "--style", "minimal", "--native",
        ]).unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "compose");
        assert!(args.get_flag("native"));
        assert!(app_options(args).is_ok());

        let matches = build_cli().try_get_matches_from(vec![
            "story_hud", "compose", "-i", "photo.jpg", "-o", "out.png", "--style", "neon",
        ]).unwrap();
        assert!(app_options(matches.subcommand().unwrap().1).is_err());
    }
}
