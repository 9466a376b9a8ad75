//! keel CLI.
//!
//! Builds the generated registration modules and JSON Schema document for a
//! keel project, and runs the dev server with rebuild on change.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use tokio::process::{Child, Command};
use tracing_subscriber::EnvFilter;

use keel_compiler::{BuildResult, Compiler, CompilerConfig, CompilerWarning, HandlerDescriptor};

mod ui;

#[derive(Parser)]
#[command(name = "keel")]
#[command(version, about = "keel - typed REST handlers with generated routing and schemas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan handlers, repos and jobs and generate the registration output
    Build {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Glob of files to leave out of discovery (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Only accept named interfaces as handler schemas
        #[arg(long)]
        strict: bool,
    },

    /// Analyze the project without writing anything
    Check {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Glob of files to leave out of discovery (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Only accept named interfaces as handler schemas
        #[arg(long)]
        strict: bool,
    },

    /// Remove the generated output directory
    Clean {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Write one JSON Schema document for every exported type in a directory
    GenerateSchemas {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Directory holding the type declarations (relative to the project)
        #[arg(short, long, default_value = "src/schemas")]
        types_dir: PathBuf,

        /// Output file (relative to the project)
        #[arg(short, long, default_value = "schemas.json")]
        out_file: PathBuf,

        /// Glob of files to leave out of discovery (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Run the application
    Run {
        #[command(subcommand)]
        mode: RunMode,
    },
}

#[derive(Subcommand)]
enum RunMode {
    /// Build, start the server and rebuild/restart on every source change
    Dev {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Application entry module (relative to the project)
        #[arg(long, default_value = "src/index.ts")]
        entry: PathBuf,

        /// Glob of files to leave out of discovery (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { dir, exclude, strict } => {
            build_project(&compiler_config(dir, exclude, strict))?;
        }
        Commands::Check { dir, exclude, strict } => {
            check_project(&compiler_config(dir, exclude, strict))?;
        }
        Commands::Clean { dir } => {
            let compiler = Compiler::new(CompilerConfig::for_project(dir));
            compiler.clean()?;
            ui::success(&format!("Removed {}", compiler.config().out_path().display()));
        }
        Commands::GenerateSchemas { dir, types_dir, out_file, exclude } => {
            generate_schemas(&compiler_config(dir, exclude, false), &types_dir, &out_file)?;
        }
        Commands::Run { mode: RunMode::Dev { dir, entry, exclude } } => {
            let mut config = compiler_config(dir, exclude, false);
            config.app_entry = entry;
            run_dev_mode(config).await?;
        }
    }

    Ok(())
}

/// Compiler warnings go to the terminal through `ui`; tracing output stays
/// quiet unless `RUST_LOG` asks for it.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

fn compiler_config(dir: PathBuf, exclude: Vec<String>, strict: bool) -> CompilerConfig {
    CompilerConfig {
        exclude,
        strict_schemas: strict,
        ..CompilerConfig::for_project(dir)
    }
}

fn build_project(config: &CompilerConfig) -> miette::Result<()> {
    let start = Instant::now();
    let spinner = ui::spinner("Building...");
    let compiler = Compiler::new(config.clone());

    let result = match compiler.build() {
        Ok(result) => result,
        Err(e) => {
            spinner.finish_and_clear();
            ui::failure_header("Build failed.");
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    print_warnings(&result.warnings);
    print_summary(&result);
    ui::timing(
        &format!("Wrote {}", config.out_path().display()),
        start.elapsed().as_millis(),
    );
    println!();
    Ok(())
}

fn check_project(config: &CompilerConfig) -> miette::Result<()> {
    let spinner = ui::spinner("Checking...");
    let outcome = Compiler::new(config.clone()).check();
    spinner.finish_and_clear();

    match outcome {
        Ok(warnings) => {
            print_warnings(&warnings);
            ui::success("No errors.");
            Ok(())
        }
        Err(e) => {
            ui::failure_header("Check failed.");
            Err(e.into())
        }
    }
}

fn generate_schemas(config: &CompilerConfig, types_dir: &Path, out_file: &Path) -> miette::Result<()> {
    let types_dir = config.project_root.join(types_dir);
    let out_file = config.project_root.join(out_file);

    let document = Compiler::new(config.clone()).generate_schemas(&types_dir, &out_file)?;
    ui::success(&format!(
        "Wrote {} definition(s) to {}",
        document.definitions.len(),
        out_file.display()
    ));
    Ok(())
}

fn print_warnings(warnings: &[CompilerWarning]) {
    for warning in warnings {
        ui::warning(&warning.to_string());
    }
    if !warnings.is_empty() {
        println!();
    }
}

fn print_summary(result: &BuildResult) {
    ui::box_header("ROUTES");
    if result.handlers.is_empty() {
        ui::box_line("   no handlers found");
    }
    for handler in &result.handlers {
        let (method, path) = route_columns(handler);
        ui::box_line(&ui::route_line(&method, &path, &handler.name));
    }
    ui::box_footer();

    ui::info(&format!(
        "{} repo(s), {} job(s), {} schema definition(s)",
        result.repos.len(),
        result.jobs.len(),
        result.schemas
    ));
}

/// Method and path as they will be registered. Handlers that opt out of
/// automatic registration are listed without a path.
fn route_columns(handler: &HandlerDescriptor) -> (String, String) {
    let method = handler
        .method()
        .map(|m| m.as_str().to_uppercase())
        .unwrap_or_else(|| "?".to_string());
    let path = match (&handler.route, handler.path()) {
        (Some(route), _) if route.skip_auto_register => "(manual)".to_string(),
        (_, Some(path)) => path.to_string(),
        (_, None) => "(no path)".to_string(),
    };
    (method, path)
}

/// Directories to watch in dev mode: the source roots, minus anything nested
/// in another root, minus the output directory.
fn watch_roots(config: &CompilerConfig) -> Vec<PathBuf> {
    let out = config.out_path();
    let mut candidates: Vec<PathBuf> = vec![
        config.handlers_path(),
        config.repos_path(),
        config.jobs_path(),
        config.schemas_path(),
    ];
    if let Some(parent) = config.app_entry_path().parent() {
        candidates.push(parent.to_path_buf());
    }

    candidates.retain(|p| p.is_dir() && !p.starts_with(&out) && !out.starts_with(p));
    candidates.sort();
    candidates.dedup();

    let roots = candidates.clone();
    candidates.retain(|p| !roots.iter().any(|root| root != p && p.starts_with(root)));
    candidates
}

/// Run dev mode with rebuild and restart on change.
async fn run_dev_mode(config: CompilerConfig) -> miette::Result<()> {
    ui::header(env!("CARGO_PKG_VERSION"));

    build_project(&config)?;

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
    let out = config.out_path();

    let mut debouncer = new_debouncer(Duration::from_millis(500), move |result: DebounceEventResult| {
        if let Ok(events) = result {
            if events.iter().any(|event| !event.path.starts_with(&out)) {
                let _ = tx.try_send(());
            }
        }
    })
    .map_err(|e| miette::miette!("Failed to create file watcher: {}", e))?;

    let roots = watch_roots(&config);
    if roots.is_empty() {
        return Err(miette::miette!(
            "Nothing to watch under {}",
            config.project_root.display()
        ));
    }
    for root in &roots {
        debouncer
            .watcher()
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| miette::miette!("Failed to watch {}: {}", root.display(), e))?;
        ui::dim(&format!("watching {}", root.display()));
    }

    let mut server = start_server(&config).await.ok();
    println!();
    ui::info("Ready! Waiting for changes...");

    loop {
        tokio::select! {
            changed = rx.recv() => {
                if changed.is_none() {
                    break;
                }
                println!();
                ui::box_header(&format!("{} REBUILD", ui::symbols::ARROW));

                if let Some(mut child) = server.take() {
                    let _ = child.kill().await;
                }

                let start = Instant::now();
                match Compiler::new(config.clone()).build() {
                    Ok(result) => {
                        ui::box_line("");
                        ui::box_line(&format!(
                            "   {} {} handler(s) in {}ms",
                            ui::symbols::OK,
                            result.handlers.len(),
                            start.elapsed().as_millis()
                        ));
                        ui::box_line("");
                        ui::box_footer();
                        print_warnings(&result.warnings);
                        server = start_server(&config).await.ok();
                    }
                    Err(e) => {
                        ui::box_line("");
                        ui::box_line(&format!("   {} build failed", ui::symbols::FAIL));
                        ui::box_line("");
                        ui::box_footer();
                        eprintln!("{:?}", miette::Report::new(e));
                    }
                }

                println!();
                ui::info("Ready! Waiting for changes...");
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                ui::dim("Shutting down...");
                if let Some(mut child) = server.take() {
                    let _ = child.kill().await;
                }
                break;
            }
        }
    }

    Ok(())
}

/// Start the generated start module under ts-node.
async fn start_server(config: &CompilerConfig) -> miette::Result<Child> {
    let start_module = config.out_dir.join("start.ts");

    let child = Command::new("npx")
        .arg("ts-node")
        .arg(&start_module)
        .current_dir(&config.project_root)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            ui::error(&format!("Failed to start the server: {}", e));
            miette::miette!("Failed to run npx ts-node {}: {}", start_module.display(), e)
        })?;

    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_compiler::{HttpMethod, RouteProps};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_args() {
        let cli = Cli::try_parse_from([
            "keel", "build", "--dir", "app", "--exclude", "**/*.test.ts", "-e", "legacy/**", "--strict",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { dir, exclude, strict } => {
                assert_eq!(dir, PathBuf::from("app"));
                assert_eq!(exclude, vec!["**/*.test.ts", "legacy/**"]);
                assert!(strict);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_generate_schemas_defaults() {
        let cli = Cli::try_parse_from(["keel", "generate-schemas"]).unwrap();
        match cli.command {
            Commands::GenerateSchemas { dir, types_dir, out_file, exclude } => {
                assert_eq!(dir, PathBuf::from("."));
                assert_eq!(types_dir, PathBuf::from("src/schemas"));
                assert_eq!(out_file, PathBuf::from("schemas.json"));
                assert!(exclude.is_empty());
            }
            _ => panic!("expected generate-schemas"),
        }
    }

    #[test]
    fn test_run_dev_entry() {
        let cli = Cli::try_parse_from(["keel", "run", "dev", "--entry", "src/main.ts"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run { mode: RunMode::Dev { entry, .. } } if entry == Path::new("src/main.ts")
        ));
        assert!(Cli::try_parse_from(["keel", "run"]).is_err());
    }

    #[test]
    fn test_route_columns() {
        let mut handler = HandlerDescriptor {
            name: "GetCar".to_string(),
            file: "src/handlers/GetCar.ts".to_string(),
            route: None,
            assumed_http_method: Some(HttpMethod::Get),
            req_schema: None,
            res_schema: None,
        };
        assert_eq!(route_columns(&handler), ("GET".to_string(), "(no path)".to_string()));

        handler.route = Some(RouteProps {
            path: Some("/car/:id".to_string()),
            ..RouteProps::default()
        });
        assert_eq!(route_columns(&handler), ("GET".to_string(), "/car/:id".to_string()));

        handler.route = Some(RouteProps {
            method: Some(HttpMethod::Put),
            skip_auto_register: true,
            ..RouteProps::default()
        });
        assert_eq!(route_columns(&handler), ("PUT".to_string(), "(manual)".to_string()));
    }

    #[test]
    fn test_watch_roots_collapse_to_src() {
        let temp = TempDir::new().unwrap();
        for dir in ["src/handlers", "src/repos", ".keel"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }

        let roots = watch_roots(&CompilerConfig::for_project(temp.path()));
        assert_eq!(roots, vec![temp.path().join("src")]);
    }

    #[test]
    fn test_watch_roots_skip_output_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("handlers")).unwrap();
        let config = CompilerConfig {
            handlers_dir: PathBuf::from("handlers"),
            app_entry: PathBuf::from("index.ts"),
            out_dir: PathBuf::from("handlers/.generated"),
            ..CompilerConfig::for_project(temp.path())
        };

        // the entry's parent is the project root, which contains the output
        assert!(watch_roots(&config).is_empty());
    }
}
