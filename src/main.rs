use clap::{Parser, Subcommand};
use std::io::Read;
use todo_assistant::todo::cli::TodoCmd;

#[derive(Parser, Debug)]
#[command(name = "todo_assistant")]
#[command(about = "To-do list driven by a chat assistant", long_about = None)]
#[command(version)]
struct Args {
    /// Verbose output (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Manage tasks directly
    #[command(subcommand)]
    Todo(TodoCmd),
    /// Apply the commands in an assistant reply ("-" reads stdin)
    Apply { reply: String },
    /// Send one message to the assistant
    Chat {
        message: String,
        #[arg(long, default_value = "default")]
        session: String,
    },
}

fn read_reply(arg: String) -> Result<String, i32> {
    if arg != "-" {
        return Ok(arg);
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).map_err(|e| {
        eprintln!("Error: reading stdin: {}", e);
        1
    })?;
    Ok(buf)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Set verbosity level (0-3)
    let verbosity = args.verbose.min(3);

    use todo_assistant::config::Config;
    Config::ensure_log_directory().ok();
    todo_assistant::init_tracing(verbosity, Some(Config::log_file_path()));
    tracing::debug!("todo_assistant {} (data in {:?})", Config::version(), Config::base_dir());

    let result = match args.command {
        Cmd::Todo(cmd) => todo_assistant::run_todo(cmd).await,
        Cmd::Apply { reply } => match read_reply(reply) {
            Ok(text) => todo_assistant::run_apply(&text).await,
            Err(code) => Err(code),
        },
        Cmd::Chat { message, session } => todo_assistant::run_chat(&session, &message).await,
    };
    if let Err(code) = result {
        std::process::exit(code);
    }
}
