use std::{env, io::Write, path::PathBuf};

use rustyline::{DefaultEditor, error::ReadlineError};
use slotdb::{
    art::welcome_message,
    config::StorageConfig,
    executor::statement::run_sql,
    storage::storage_manager::StorageManager,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

const HISTORY_FILE_ENV: &str = "SLOTDB_HISTORY_FILE";
const DEFAULT_HISTORY_FILE: &str = ".slotdb_history";

fn history_file() -> PathBuf {
    env::var(HISTORY_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_HISTORY_FILE))
}

fn read_multiline_command(rl: &mut DefaultEditor) -> rustyline::Result<String> {
    let mut input = String::new();
    let mut prompt = "slotdb> ".to_string();

    loop {
        let line = rl.readline(&prompt)?;
        let trimmed_line = line.trim_end();

        // A trailing backslash continues the statement on the next line.
        match trimmed_line.strip_suffix('\\') {
            Some(continued) => {
                input.push_str(continued);
                input.push(' ');
                prompt = "     -> ".to_string();
            }
            None => {
                input.push_str(trimmed_line);
                break;
            }
        }
    }

    Ok(input)
}

/// Run one command; returns false when the shell should exit
fn process_command(storage: &mut StorageManager, command: &str) -> bool {
    let cmd = command.trim();

    match cmd.to_lowercase().as_str() {
        "exit" | "quit" | "q" => {
            println!("Goodbye!");
            return false;
        }
        "help" | "h" => {
            println!(
                r#"
Available commands:
  help, h          - Show this help message
  clear, ctrl + l  - Clear the screen
  exit, quit, q    - Exit the database

Statements:
  SHOW TABLES
  CREATE TABLE t (col TYPE [PRIMARY KEY | UNIQUE | NOT NULL], ...)
  CREATE INDEX [name] ON t (col)
  DROP TABLE t
  INSERT INTO t [(cols)] VALUES (...)[, (...)]
  SELECT * | cols FROM t [WHERE col op literal]
  DELETE FROM t [WHERE col op literal]

Types: TINYINT SMALLINT INT BIGINT FLOAT DOUBLE YEAR TIME DATETIME DATE TEXT
Use '\' at the end of a line for multiline input.
Use Up/Down arrows to navigate command history.
"#
            );
        }
        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
        }
        "" => {}
        _ => match run_sql(storage, cmd) {
            Ok(result) => println!("{}", result),
            Err(err) => {
                error!(%err, statement = cmd, "statement failed");
                println!("Error: {}", err);
            }
        },
    }

    true
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    println!("{}", welcome_message("SLOTDB"));

    let mut storage = StorageManager::with_config(StorageConfig::from_env())?;
    let history_file = history_file();

    let mut rl = DefaultEditor::new()?;
    // A missing history file is normal on first start.
    let _ = rl.load_history(&history_file);

    loop {
        match read_multiline_command(&mut rl) {
            Ok(input) => {
                let command = input.trim().to_string();
                if command.is_empty() {
                    continue;
                }
                rl.add_history_entry(&command)?;
                if !process_command(&mut storage, &command) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    rl.save_history(&history_file)?;
    Ok(())
}
