use std::{error::Error, fs::File, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{
    Account, AccountKind, AccountListFilter, AccountStatus, BalanceAudit, Client, ClientDetails,
    ClientListFilter, Engine, EngineError, Identifier, IdentifierGenerator, Money, OpenAccountCmd,
    LedgerSummary, Page, Paged, PostTransactionCmd, RandomSource, ResultEngine, Transaction,
    TransactionKind, TransactionListFilter, UpdateAccountCmd, UpdateTransactionCmd,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde::Serialize;
use uuid::Uuid;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "bank")]
#[command(about = "Clients, accounts and transactions of a small bank ledger")]
struct Cli {
    /// Settings file (TOML, extension optional).
    #[arg(long)]
    config: Option<String>,

    /// Database connection string; overrides the settings file.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Page size for listings (1..=100).
    #[arg(long, global = true)]
    page_size: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Client(ClientArgs),
    Account(AccountArgs),
    Tx(TxArgs),
    /// Compare stored balances with the transactions that produced them.
    Audit(AuditArgs),
    /// Client and account counts and the sum of all balances.
    Summary,
    /// Manage the database schema.
    Migrate {
        #[arg(value_enum, default_value_t = MigrateAction::Up)]
        action: MigrateAction,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MigrateAction {
    Up,
    Down,
    Fresh,
    Status,
}

#[derive(Args, Debug)]
struct ClientArgs {
    #[command(subcommand)]
    command: ClientCommand,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    Create(ClientFields),
    Update {
        id: Uuid,
        #[command(flatten)]
        fields: ClientFields,
    },
    Show {
        id: Uuid,
    },
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// Delete a client with all of its accounts and transactions.
    Delete {
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct ClientFields {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    province: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
}

impl From<ClientFields> for ClientDetails {
    fn from(fields: ClientFields) -> Self {
        ClientDetails {
            first_name: fields.first_name,
            last_name: fields.last_name,
            email: fields.email,
            phone: fields.phone,
            address: fields.address,
            city: fields.city,
            province: fields.province,
            postal_code: fields.postal_code,
        }
    }
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Open {
        #[arg(long)]
        client: Uuid,
        #[arg(long, value_parser = parse_account_kind, default_value = "chequing")]
        kind: AccountKind,
        #[arg(long, value_parser = parse_money)]
        opening_balance: Option<Money>,
        #[arg(long, value_parser = parse_account_status)]
        status: Option<AccountStatus>,
        #[arg(long)]
        open_date: Option<NaiveDate>,
    },
    Update {
        /// Account id or 10-digit number.
        account: String,
        #[arg(long, value_parser = parse_account_kind)]
        kind: Option<AccountKind>,
        #[arg(long, value_parser = parse_account_status)]
        status: Option<AccountStatus>,
        #[arg(long)]
        client: Option<Uuid>,
    },
    Show {
        account: String,
    },
    List {
        #[arg(long)]
        client: Option<Uuid>,
        #[arg(long, value_parser = parse_account_kind)]
        kind: Option<AccountKind>,
        #[arg(long, value_parser = parse_account_status)]
        status: Option<AccountStatus>,
        #[arg(long)]
        number_prefix: Option<String>,
        /// Match the account number or the owner's first or last name.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// Delete an account and all of its transactions.
    Delete {
        account: String,
    },
    /// Write the account's transactions as CSV.
    Export {
        account: String,
        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Args, Debug)]
struct TxArgs {
    #[command(subcommand)]
    command: TxCommand,
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    /// Post a deposit, withdrawal or transfer.
    Post {
        #[arg(long)]
        account: String,
        #[arg(long, value_parser = parse_transaction_kind)]
        kind: TransactionKind,
        #[arg(long, value_parser = parse_money)]
        amount: Money,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        /// Transaction id or 10-digit number.
        transaction: String,
        #[arg(long, value_parser = parse_money)]
        amount: Option<Money>,
        #[arg(long, value_parser = parse_transaction_kind)]
        kind: Option<TransactionKind>,
        /// Move the transaction to another account.
        #[arg(long)]
        account: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
    },
    Show {
        transaction: String,
    },
    List {
        #[arg(long)]
        account: Option<String>,
        #[arg(long, value_parser = parse_transaction_kind)]
        kind: Option<TransactionKind>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        /// Match the description or the transaction number.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
    /// Delete a transaction and reverse its effect on the balance.
    Delete {
        transaction: String,
    },
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// Audit a single account; every account when omitted.
    account: Option<String>,
}

fn parse_account_kind(raw: &str) -> Result<AccountKind, String> {
    AccountKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_account_status(raw: &str) -> Result<AccountStatus, String> {
    AccountStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_transaction_kind(raw: &str) -> Result<TransactionKind, String> {
    TransactionKind::try_from(raw).map_err(|err| err.to_string())
}

fn parse_money(raw: &str) -> Result<Money, String> {
    raw.parse::<Money>().map_err(|err| err.to_string())
}

/// Prints either JSON or a human-readable rendering.
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> AppResult<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text(value));
        }
        Ok(())
    }

    fn emit_page<T: Serialize>(
        &self,
        paged: &Paged<T>,
        line: impl Fn(&T) -> String,
    ) -> AppResult<()> {
        self.emit(paged, |paged| {
            let mut lines: Vec<String> = paged.items.iter().map(&line).collect();
            lines.push(format!(
                "page {}/{} ({} total)",
                paged.page.number,
                paged.total_pages.max(1),
                paged.total_items
            ));
            lines.join("\n")
        })
    }
}

fn client_line(client: &Client) -> String {
    format!("{}  {} <{}>", client.id, client.full_name(), client.email)
}

fn account_line(account: &Account) -> String {
    format!(
        "{}  {:<10} {:<8} {:>14}  opened {}  id {}",
        account.number,
        account.kind,
        account.status,
        account.balance,
        account.open_date,
        account.id
    )
}

fn transaction_line(transaction: &Transaction) -> String {
    format!(
        "{}  {}  {:<10} {:>14}  {}",
        transaction.number,
        transaction.occurred_at.format("%Y-%m-%d %H:%M:%S"),
        transaction.kind,
        transaction.amount,
        transaction.description.as_deref().unwrap_or("-")
    )
}

fn audit_line(audit: &BalanceAudit) -> String {
    let verdict = if audit.is_consistent() { "ok" } else { "MISMATCH" };
    format!(
        "{}  opening {} + deposits {} - debits {} = {} (stored {})  {verdict}",
        audit.account_id,
        audit.opening_balance,
        audit.deposits,
        audit.debits,
        audit.expected,
        audit.actual
    )
}

/// Accepts either the account id or its public number.
async fn resolve_account(engine: &Engine, raw: &str) -> ResultEngine<Account> {
    match Uuid::parse_str(raw) {
        Ok(id) => engine.account(id).await,
        Err(_) => engine.account_by_number(&Identifier::try_from(raw)?).await,
    }
}

async fn resolve_transaction(engine: &Engine, raw: &str) -> ResultEngine<Transaction> {
    match Uuid::parse_str(raw) {
        Ok(id) => engine.transaction(id).await,
        Err(_) => engine.transaction_by_number(&Identifier::try_from(raw)?).await,
    }
}

async fn run_client(
    engine: &Engine,
    command: ClientCommand,
    page_size: u64,
    out: &Output,
) -> AppResult<()> {
    match command {
        ClientCommand::Create(fields) => {
            let client = engine.create_client(&fields.into()).await?;
            out.emit(&client, client_line)
        }
        ClientCommand::Update { id, fields } => {
            let client = engine.update_client(id, &fields.into()).await?;
            out.emit(&client, client_line)
        }
        ClientCommand::Show { id } => {
            let client = engine.client(id).await?;
            let accounts = engine.list_accounts_of_client(id).await?;
            out.emit(&(client, accounts), |(client, accounts)| {
                let mut lines = vec![client_line(client)];
                lines.extend(
                    accounts
                        .iter()
                        .map(|account| format!("  {}", account_line(account))),
                );
                lines.join("\n")
            })
        }
        ClientCommand::List { search, city, page } => {
            let filter = ClientListFilter { search, city };
            let paged = engine
                .list_clients(&filter, Page::new(page, page_size))
                .await?;
            out.emit_page(&paged, client_line)
        }
        ClientCommand::Delete { id } => {
            let deleted = engine.delete_client(id).await?;
            out.emit(&deleted, |deleted| {
                format!(
                    "deleted client with {} accounts and {} transactions",
                    deleted.accounts, deleted.transactions
                )
            })
        }
    }
}

async fn run_account(
    engine: &Engine,
    command: AccountCommand,
    page_size: u64,
    out: &Output,
) -> AppResult<()> {
    match command {
        AccountCommand::Open {
            client,
            kind,
            opening_balance,
            status,
            open_date,
        } => {
            let mut cmd = OpenAccountCmd::new(client, kind);
            if let Some(balance) = opening_balance {
                cmd = cmd.opening_balance(balance);
            }
            if let Some(status) = status {
                cmd = cmd.status(status);
            }
            if let Some(date) = open_date {
                cmd = cmd.open_date(date);
            }
            let account = engine.open_account(&cmd).await?;
            out.emit(&account, account_line)
        }
        AccountCommand::Update {
            account,
            kind,
            status,
            client,
        } => {
            let mut cmd = UpdateAccountCmd::new(resolve_account(engine, &account).await?.id);
            if let Some(kind) = kind {
                cmd = cmd.kind(kind);
            }
            if let Some(status) = status {
                cmd = cmd.status(status);
            }
            if let Some(client) = client {
                cmd = cmd.client_id(client);
            }
            let account = engine.update_account(&cmd).await?;
            out.emit(&account, account_line)
        }
        AccountCommand::Show { account } => {
            let account = resolve_account(engine, &account).await?;
            out.emit(&account, account_line)
        }
        AccountCommand::List {
            client,
            kind,
            status,
            number_prefix,
            search,
            page,
        } => {
            let filter = AccountListFilter {
                client_id: client,
                kind,
                status,
                number_prefix,
                search,
            };
            let paged = engine
                .list_accounts(&filter, Page::new(page, page_size))
                .await?;
            out.emit_page(&paged, account_line)
        }
        AccountCommand::Delete { account } => {
            let account = resolve_account(engine, &account).await?;
            let deleted = engine.delete_account(account.id).await?;
            out.emit(&deleted, |deleted| {
                format!(
                    "deleted account {} with {} transactions",
                    account.number, deleted.transactions
                )
            })
        }
        AccountCommand::Export { account, output } => {
            let account = resolve_account(engine, &account).await?;
            let written = match output {
                Some(path) => {
                    engine
                        .export_transactions_csv(account.id, File::create(&path)?)
                        .await?
                }
                None => {
                    engine
                        .export_transactions_csv(account.id, std::io::stdout())
                        .await?
                }
            };
            tracing::debug!(rows = written, "export complete");
            Ok(())
        }
    }
}

async fn run_tx(
    engine: &Engine,
    command: TxCommand,
    page_size: u64,
    out: &Output,
) -> AppResult<()> {
    match command {
        TxCommand::Post {
            account,
            kind,
            amount,
            description,
        } => {
            let account = resolve_account(engine, &account).await?;
            let mut cmd = PostTransactionCmd::new(account.id, kind, amount);
            if let Some(description) = description {
                cmd = cmd.description(description);
            }
            let posting = engine.post(&cmd).await?;
            out.emit(&posting, |posting| {
                format!("{} New balance: {}", posting.message, posting.new_balance)
            })
        }
        TxCommand::Update {
            transaction,
            amount,
            kind,
            account,
            description,
            clear_description,
        } => {
            let transaction = resolve_transaction(engine, &transaction).await?;
            let mut cmd = UpdateTransactionCmd::new(transaction.id);
            if let Some(amount) = amount {
                cmd = cmd.amount(amount);
            }
            if let Some(kind) = kind {
                cmd = cmd.kind(kind);
            }
            if let Some(account) = account {
                cmd = cmd.account_id(resolve_account(engine, &account).await?.id);
            }
            if clear_description {
                cmd = cmd.description(None);
            } else if let Some(description) = description {
                cmd = cmd.description(Some(description));
            }
            let transaction = engine.update_transaction(&cmd).await?;
            out.emit(&transaction, transaction_line)
        }
        TxCommand::Show { transaction } => {
            let transaction = resolve_transaction(engine, &transaction).await?;
            out.emit(&transaction, transaction_line)
        }
        TxCommand::List {
            account,
            kind,
            from,
            to,
            search,
            page,
        } => {
            let account_id = match account {
                Some(account) => Some(resolve_account(engine, &account).await?.id),
                None => None,
            };
            let filter = TransactionListFilter {
                account_id,
                kind,
                from,
                to,
                search,
            };
            let paged = engine
                .list_transactions(&filter, Page::new(page, page_size))
                .await?;
            out.emit_page(&paged, transaction_line)
        }
        TxCommand::Delete { transaction } => {
            let transaction = resolve_transaction(engine, &transaction).await?;
            let balance = engine.delete_transaction(transaction.id).await?;
            out.emit(&balance, |balance| {
                format!("Transaction {} deleted. New balance: {balance}", transaction.number)
            })
        }
    }
}

async fn run_audit(engine: &Engine, args: AuditArgs, out: &Output) -> AppResult<()> {
    match args.account {
        Some(account) => {
            let account = resolve_account(engine, &account).await?;
            let audit = engine.audit_account(account.id).await?;
            out.emit(&audit, audit_line)
        }
        None => {
            let mismatched = engine.audit_all_accounts().await?;
            out.emit(&mismatched, |mismatched| {
                if mismatched.is_empty() {
                    "all balances match their transactions".to_string()
                } else {
                    mismatched.iter().map(audit_line).collect::<Vec<_>>().join("\n")
                }
            })
        }
    }
}

fn summary_text(summary: &LedgerSummary) -> String {
    format!(
        "clients {}\naccounts {} ({} active)\ntotal balance {}",
        summary.total_clients,
        summary.total_accounts,
        summary.active_accounts,
        summary.total_balance
    )
}

async fn run_summary(engine: &Engine, out: &Output) -> AppResult<()> {
    let summary = engine.summary().await?;
    out.emit(&summary, summary_text)
}

async fn connect_db(database_url: &str) -> AppResult<DatabaseConnection> {
    let db = Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run_migrate(database_url: &str, action: MigrateAction) -> AppResult<()> {
    let db = Database::connect(database_url).await?;
    match action {
        MigrateAction::Up => Migrator::up(&db, None).await?,
        MigrateAction::Down => Migrator::down(&db, None).await?,
        MigrateAction::Fresh => Migrator::fresh(&db).await?,
        MigrateAction::Status => Migrator::status(&db).await?,
    }
    tracing::info!(?action, "migration finished");
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "bank={level},engine={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url());
    if let Command::Migrate { action } = cli.command {
        return run_migrate(&database_url, action).await;
    }

    let db = connect_db(&database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .identifiers(IdentifierGenerator::new(
            Arc::new(RandomSource),
            settings.identifier_attempts,
        ))
        .build()
        .await?;

    let page_size = cli.page_size.unwrap_or(settings.page_size);
    let out = Output { json: cli.json };
    let result = match cli.command {
        Command::Client(ClientArgs { command }) => {
            run_client(&engine, command, page_size, &out).await
        }
        Command::Account(AccountArgs { command }) => {
            run_account(&engine, command, page_size, &out).await
        }
        Command::Tx(TxArgs { command }) => run_tx(&engine, command, page_size, &out).await,
        Command::Audit(args) => run_audit(&engine, args, &out).await,
        Command::Summary => run_summary(&engine, &out).await,
        Command::Migrate { .. } => Ok(()),
    };

    if let Err(err) = result {
        match err.downcast_ref::<EngineError>() {
            Some(rejection) if rejection.is_rejection() => {
                match rejection.field() {
                    Some(field) => {
                        eprintln!("rejected ({}, {field}): {rejection}", rejection.code());
                    }
                    None => eprintln!("rejected ({}): {rejection}", rejection.code()),
                }
                std::process::exit(1);
            }
            _ => return Err(err),
        }
    }

    Ok(())
}
