use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use rocktobot::build::{build_site, effective_metadata, fetch_posts};
use rocktobot::config::{Config, Options, API_KEY_VAR};
use rocktobot::detail::{mailto_link, DetailQuery, Lookup, NO_COMMENTS};
use rocktobot::fetch::{Fetcher, HttpTransport};
use rocktobot::listing::{ListQuery, ListView, SortOrder, LOAD_FAILED, NO_POSTS};
use rocktobot::normalize::Normalizer;
use rocktobot::post::format_date;
use rocktobot::portfolio::{find_project, load_projects, NO_PROJECTS, PROJECT_NOT_FOUND};
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let sort_values: Vec<&str> = SortOrder::ALL.iter().map(|s| s.as_str()).collect();
    let refresh = Arg::with_name("refresh")
        .long("refresh")
        .help("Ignore cached posts and fetch them again");
    let matches = App::new("rocktobot")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("project")
                .long("project")
                .short("p")
                .takes_value(true)
                .global(true)
                .help("The project file (defaults to the nearest `rocktobot.yaml`)"),
        )
        .arg(
            Arg::with_name("cache-dir")
                .long("cache-dir")
                .takes_value(true)
                .global(true)
                .help("The directory holding the post cache"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site")
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .default_value("_output")
                        .help("The output directory"),
                )
                .arg(refresh.clone()),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("Prints the post list for a `tag=..&sort=..` selection")
                .arg(Arg::with_name("query").index(1))
                .arg(
                    Arg::with_name("tag")
                        .long("tag")
                        .takes_value(true)
                        .help("Only show posts with this tag"),
                )
                .arg(
                    Arg::with_name("sort")
                        .long("sort")
                        .takes_value(true)
                        .possible_values(&sort_values)
                        .help("The post order"),
                )
                .arg(refresh.clone()),
        )
        .subcommand(
            SubCommand::with_name("show")
                .about("Prints a single post or project")
                .arg(Arg::with_name("query").index(1).help("An `id=..` selection"))
                .arg(
                    Arg::with_name("post")
                        .long("post")
                        .takes_value(true)
                        .conflicts_with("portfolio-project")
                        .help("The post identifier"),
                )
                .arg(
                    Arg::with_name("portfolio-project")
                        .long("portfolio-project")
                        .takes_value(true)
                        .help("The portfolio project identifier"),
                )
                .arg(refresh),
        )
        .get_matches();

    if let Err(e) = run(&matches) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        ("build", Some(matches)) => {
            let config = config(matches, Path::new(matches.value_of("output").unwrap_or("_output")))?;
            build_site(&config, matches.is_present("refresh"))?;
            log::info!(
                "Built {} into {}",
                config.home_page,
                config.root_output_directory.display()
            );
            Ok(())
        }
        ("list", Some(matches)) => list(matches),
        ("show", Some(matches)) => show(matches),
        _ => Ok(()),
    }
}

fn config(matches: &ArgMatches, output_directory: &Path) -> Result<Config> {
    let options = Options {
        output_directory: output_directory.to_owned(),
        cache_directory: matches.value_of("cache-dir").map(PathBuf::from),
        api_key: std::env::var(API_KEY_VAR).ok(),
    };
    Ok(match matches.value_of("project") {
        Some(path) => Config::from_project_file(Path::new(path), &options)?,
        None => Config::from_directory(&std::env::current_dir()?, &options)?,
    })
}

fn list(matches: &ArgMatches) -> Result<()> {
    let config = config(matches, Path::new("_output"))?;
    let transport = HttpTransport::new(config.http_timeout)?;
    let fetcher = Fetcher::new(&transport, &config.blog, &config.api_key);
    let metadata = effective_metadata(&config, &transport);

    let mut query = ListQuery::parse(matches.value_of("query").unwrap_or(""));
    if let Some(tag) = matches.value_of("tag") {
        query.tag = Some(tag.to_owned());
    }
    if let Some(sort) = matches.value_of("sort") {
        query.sort = SortOrder::parse_or_default(sort);
    }

    let loaded = fetch_posts(
        &config,
        &fetcher,
        matches.is_present("refresh"),
        chrono::Utc::now().timestamp_millis(),
    );
    match ListView::from_load(loaded, &query) {
        ListView::Ready(state) => {
            println!("Tags: {}", state.tags(&metadata).join(" "));
            println!("Sort: {}", state.sort.label());
            let visible = state.visible(&metadata);
            if visible.is_empty() {
                println!("{}", NO_POSTS);
            }
            for post in visible {
                let tags: Vec<String> = post
                    .resolved_tags(&metadata)
                    .into_iter()
                    .map(|tag| tag.name)
                    .collect();
                println!(
                    "{}\t{}\t{}\t{}",
                    post.id,
                    format_date(post.timestamp),
                    post.resolved_title(&metadata),
                    tags.join(" ")
                );
            }
        }
        ListView::Error(e) => {
            log::error!("{}", e);
            println!("{}", LOAD_FAILED);
        }
        _ => println!("{}", NO_POSTS),
    }
    Ok(())
}

fn show(matches: &ArgMatches) -> Result<()> {
    let config = config(matches, Path::new("_output"))?;

    if let Some(id) = matches.value_of("portfolio-project") {
        let projects = load_projects(&config.projects_file);
        match find_project(&projects, id) {
            _ if projects.is_empty() => println!("{}", NO_PROJECTS),
            None => println!("{}", PROJECT_NOT_FOUND),
            Some(project) => {
                println!("{}", project.title);
                if let Some(time_frame) = &project.time_frame {
                    println!("{}", time_frame);
                }
                if let Some(description) = &project.description {
                    println!("\n{}", description);
                }
                for link in &project.links {
                    println!("{}: {}", link.label, link.url);
                }
                println!("{} gallery images", project.gallery.len());
            }
        }
        return Ok(());
    }

    let query = match matches.value_of("post") {
        Some(id) => DetailQuery {
            id: Some(id.to_owned()),
        },
        None => DetailQuery::parse(matches.value_of("query").unwrap_or("")),
    };
    let transport = HttpTransport::new(config.http_timeout)?;
    let fetcher = Fetcher::new(&transport, &config.blog, &config.api_key);
    let metadata = effective_metadata(&config, &transport);
    let posts = fetch_posts(
        &config,
        &fetcher,
        matches.is_present("refresh"),
        chrono::Utc::now().timestamp_millis(),
    )
    .unwrap_or_else(|e| {
        log::error!("Error loading posts: {}", e);
        Vec::new()
    });

    let lookup = Lookup::find(&posts, &query);
    let post = match lookup {
        Lookup::Found(post) => post,
        other => {
            println!("{}", other.message().unwrap_or(""));
            return Ok(());
        }
    };

    let comments = fetcher.fetch_notes(&post.id);
    let normalizer = Normalizer::new(&config.platform_host, config.site_host.as_deref());
    let tags: Vec<String> = post
        .resolved_tags(&metadata)
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    println!("{}", post.resolved_title(&metadata));
    println!("{}", format_date(post.timestamp));
    println!("{}", tags.join(" "));
    println!("\n{}\n", normalizer.render_content(post));
    match comments.is_empty() {
        true => println!("{}", NO_COMMENTS),
        false => {
            for comment in &comments {
                println!(
                    "{} ({}) {}: {}",
                    comment.blog.name,
                    comment.blog_url(),
                    comment.formatted_date(),
                    comment.content
                );
            }
        }
    }
    if let Some(email) = &config.contact_email {
        println!(
            "\nContact: {}",
            mailto_link(email, "", "", &post.resolved_title(&metadata))
        );
    }
    Ok(())
}
