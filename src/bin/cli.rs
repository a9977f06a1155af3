// Circulation - Library Checkout Ledger
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{Context, Result};
use circulation_core::clock::{Clock, SystemClock};
use circulation_core::config::CirculationConfig;
use circulation_core::directory::SqliteUserDirectory;
use circulation_core::ledger::{CheckoutLedger, SqliteLedgerStore};
use circulation_core::storage::{queries, BookId, CheckoutId, Database, NewBook, NewUser, UserId};
use circulation_core::CirculationError;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "circulation-cli")]
#[command(about = "Circulation CLI - library checkout ledger administration", long_about = None)]
struct Cli {
    /// Database file (overrides configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Reader,
    Staff,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run migrations
    Init,
    /// Register a user
    AddUser {
        name: String,
        email: String,
        #[arg(long, value_enum, default_value = "reader")]
        role: RoleArg,
    },
    /// Add a book to the catalog with all copies available
    AddBook {
        title: String,
        author: String,
        #[arg(long, default_value_t = 1)]
        copies: i64,
        #[arg(long)]
        isbn: Option<String>,
    },
    /// Lend a copy of a book
    Borrow {
        user_id: i64,
        book_id: i64,
        #[arg(long, default_value_t = 14)]
        days: i64,
    },
    /// Return a checked-out copy
    Return {
        /// Borrower, or staff returning on their behalf
        actor_id: i64,
        checkout_id: String,
    },
    /// Extend the due date of an active loan
    Renew {
        user_id: i64,
        checkout_id: String,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Change the total number of copies of a book
    SetCopies {
        staff_id: i64,
        book_id: i64,
        total: i64,
    },
    /// List active loans of a user, or every overdue loan
    Loans {
        #[arg(required_unless_present = "overdue")]
        user_id: Option<i64>,
        #[arg(long)]
        overdue: bool,
    },
    /// Show the inventory audit trail of a book
    Adjustments { book_id: i64 },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("circulation_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<CirculationError>() {
            Some(e) if e.is_business_rule() || e.is_retryable() => {
                eprintln!("{}", e.user_message());
            }
            _ => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = CirculationConfig::load().context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = Some(path);
    }

    let path = config.database_path();
    let db = Database::new(&path, &config.database)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    let ledger = CheckoutLedger::new(
        SqliteLedgerStore::from_database(&db),
        Arc::new(SqliteUserDirectory::new(db.pool().clone())),
        config.policy(),
    );

    match cli.command {
        Commands::Init => {
            print_json(&serde_json::json!({ "database": path }))?;
        }
        Commands::AddUser { name, email, role } => {
            let user = match role {
                RoleArg::Reader => NewUser::reader(name, email),
                RoleArg::Staff => NewUser::staff(name, email),
            };
            let user_id = queries::insert_user(db.pool(), &user).await?;
            print_json(&serde_json::json!({ "user_id": user_id }))?;
        }
        Commands::AddBook {
            title,
            author,
            copies,
            isbn,
        } => {
            let mut book = NewBook::new(title, author, copies);
            if let Some(isbn) = isbn {
                book = book.with_isbn(isbn);
            }
            let book_id = queries::insert_book(db.pool(), &book).await?;
            print_json(&queries::find_book(db.pool(), book_id).await?)?;
        }
        Commands::Borrow {
            user_id,
            book_id,
            days,
        } => {
            let receipt = ledger.borrow(UserId(user_id), BookId(book_id), days).await?;
            print_json(&receipt)?;
        }
        Commands::Return {
            actor_id,
            checkout_id,
        } => {
            let checkout_id: CheckoutId = checkout_id.parse()?;
            let receipt = ledger.return_book(UserId(actor_id), checkout_id).await?;
            print_json(&receipt)?;
        }
        Commands::Renew {
            user_id,
            checkout_id,
            days,
        } => {
            let checkout_id: CheckoutId = checkout_id.parse()?;
            let checkout = ledger.renew(UserId(user_id), checkout_id, days).await?;
            print_json(&checkout)?;
        }
        Commands::SetCopies {
            staff_id,
            book_id,
            total,
        } => {
            let adjustment = ledger
                .update_inventory(UserId(staff_id), BookId(book_id), total)
                .await?;
            print_json(&adjustment)?;
        }
        Commands::Loans { user_id, overdue } => {
            let loans = match user_id {
                Some(user_id) if !overdue => {
                    queries::list_active_checkouts_for_user(db.pool(), UserId(user_id)).await?
                }
                Some(user_id) => queries::list_overdue_checkouts(db.pool(), SystemClock.now())
                    .await?
                    .into_iter()
                    .filter(|c| c.user_id == UserId(user_id))
                    .collect(),
                None => queries::list_overdue_checkouts(db.pool(), SystemClock.now()).await?,
            };
            print_json(&loans)?;
        }
        Commands::Adjustments { book_id } => {
            let adjustments = queries::list_inventory_adjustments(db.pool(), BookId(book_id)).await?;
            print_json(&adjustments)?;
        }
    }

    db.checkpoint().await?;
    db.close().await?;
    Ok(())
}
