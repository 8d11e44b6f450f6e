#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use tsrun_core::Config;
use tsrun_supervisor::RunTarget;

#[derive(Parser, Debug)]
#[command(name = "tsrun")]
#[command(author, version, about = "Run TypeScript on an unmodified host runtime", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (logs, and results where supported)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// tsconfig.json providing `compilerOptions.paths`
    #[arg(long, global = true, value_name = "PATH")]
    tsconfig: Option<PathBuf>,

    /// Disable caching in the transform service
    #[arg(long, global = true)]
    no_cache: bool,

    /// Host runtime executable [default: node]
    #[arg(long, global = true, value_name = "PROGRAM")]
    runtime: Option<String>,

    /// Loader module preloaded into the runtime; empty disables it [default: built-in loader]
    #[arg(long, global = true, value_name = "MODULE")]
    loader: Option<String>,

    /// Extra argument for the runtime (repeatable)
    #[arg(
        long = "node-arg",
        global = true,
        value_name = "ARG",
        allow_hyphen_values = true
    )]
    node_args: Vec<String>,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Run mode: a script, eval/print code, the test runner, or a REPL.
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Evaluate code
    #[arg(short = 'e', long, value_name = "CODE", conflicts_with_all = ["print", "test"])]
    eval: Option<String>,

    /// Evaluate code and print the result
    #[arg(short = 'p', long, value_name = "CODE", conflicts_with = "test")]
    print: Option<String>,

    /// How the runtime treats eval/print code (e.g. `module`, `commonjs`)
    #[arg(long, value_name = "TYPE")]
    input_type: Option<String>,

    /// Run the runtime's test runner on SCRIPT and ARGS (or the default test glob)
    #[arg(long)]
    test: bool,

    /// Script to run
    script: Option<String>,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl RunArgs {
    fn into_target(self) -> RunTarget {
        if let Some(code) = self.eval {
            return RunTarget::Eval {
                code,
                print: false,
                input_type: self.input_type,
            };
        }
        if let Some(code) = self.print {
            return RunTarget::Eval {
                code,
                print: true,
                input_type: self.input_type,
            };
        }
        if self.test {
            return RunTarget::Test {
                files: self.script.into_iter().chain(self.args).collect(),
            };
        }
        match self.script {
            Some(path) => RunTarget::Script {
                path,
                args: self.args,
            },
            None => RunTarget::Repl,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a script and restart it when files change
    Watch {
        /// Also watch the directory containing this path (repeatable)
        #[arg(long, value_name = "PATH")]
        include: Vec<PathBuf>,

        /// Directory name to ignore in addition to the defaults (repeatable)
        #[arg(long, value_name = "PATH")]
        exclude: Vec<String>,

        /// Clear the screen before each restart
        #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
        clear_screen: bool,

        /// Script to run
        script: Option<String>,

        /// Arguments passed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Resolve a specifier the way the loader would
    Resolve {
        /// Module specifier (e.g. `./util.js`, `@app/db`)
        specifier: String,

        /// File the import appears in [default: <cwd>/index.ts]
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,

        /// Extra export condition (repeatable)
        #[arg(long = "condition", value_name = "NAME")]
        conditions: Vec<String>,
    },

    /// Print the source the loader produces for a file
    Load {
        /// File to load
        file: PathBuf,

        /// Format chosen by the resolver
        #[arg(long, value_name = "FORMAT", value_parser = ["module", "commonjs"])]
        format: Option<String>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    // Environment first, flags override.
    let config = Config::from_env(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_tsconfig(cli.tsconfig)
        .with_no_cache(cli.no_cache)
        .with_runtime(cli.runtime)
        .with_loader(cli.loader);

    logging::init(config.verbosity, config.json_logs);

    let code = match cli.command {
        Some(Commands::Version) => commands::version::run()?,
        Some(Commands::Resolve {
            specifier,
            from,
            conditions,
        }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %config.cwd.display());
            let _guard = span.enter();
            commands::resolve::run(&config, &specifier, from, &conditions, cli.json)?
        }
        Some(Commands::Load { file, format }) => {
            let span = tracing::info_span!("load", cmd = "load", cwd = %config.cwd.display());
            let _guard = span.enter();
            commands::load::run(&config, &file, format.as_deref(), cli.json)?
        }
        Some(Commands::Watch {
            include,
            exclude,
            clear_screen,
            script,
            args,
        }) => {
            let span = tracing::info_span!("watch", cmd = "watch", cwd = %config.cwd.display());
            let _guard = span.enter();
            let action = commands::watch::WatchAction {
                script,
                args,
                include,
                exclude,
                clear_screen,
            };
            commands::watch::run(&config, &cli.node_args, action)?
        }
        None => {
            let span = tracing::info_span!("run", cmd = "run", cwd = %config.cwd.display());
            let _guard = span.enter();
            commands::run::run(&config, &cli.node_args, cli.run.into_target())?
        }
    };

    std::process::exit(code);
}
