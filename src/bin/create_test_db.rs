use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use billetera::{
    PasswordHash, ValidatedPassword, initialize_db,
    seed::{
        CategoryKind, NewEnvelope, NewWallet, TransactionKind, TransactionRequest, WalletType,
        assign_budget, create_category, create_default_user_config, create_envelope,
        create_subcategory, create_user, create_wallet, record_transaction,
        start_free_subscription,
    },
};

/// A utility for creating a test database for the REST API server of billetera.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

const TEST_EMAIL: &str = "test@example.com";
const TEST_PASSWORD: &str = "test";

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let mut conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    let transaction = conn.transaction()?;
    seed_demo_data(&transaction)?;
    transaction.commit()?;

    println!("Success! Log in with {TEST_EMAIL} and the password \"{TEST_PASSWORD}\".");

    Ok(())
}

fn seed_demo_data(connection: &Connection) -> Result<(), Box<dyn Error>> {
    let today = OffsetDateTime::now_utc().date();

    println!("Creating test user...");
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(TEST_PASSWORD),
        PasswordHash::DEFAULT_COST,
    )?;
    let user = create_user(TEST_EMAIL, "Test User", password_hash, connection)?;
    start_free_subscription(user.id, connection)?;
    create_default_user_config(user.id, connection)?;

    println!("Creating wallets...");
    let bank = create_wallet(
        user.id,
        &NewWallet {
            name: "Everyday".to_owned(),
            wallet_type: WalletType::Bank,
            currency: None,
            initial_balance: 2500.0,
        },
        today,
        connection,
    )?;
    let cash = create_wallet(
        user.id,
        &NewWallet {
            name: "Cash".to_owned(),
            wallet_type: WalletType::Cash,
            currency: None,
            initial_balance: 80.0,
        },
        today,
        connection,
    )?;

    println!("Creating categories...");
    let food = create_category(user.id, "Food", CategoryKind::Expense, connection)?;
    let groceries = create_subcategory(food.id, user.id, "Groceries", connection)?;
    let takeaways = create_subcategory(food.id, user.id, "Takeaways", connection)?;
    let wages = create_category(user.id, "Wages", CategoryKind::Income, connection)?;

    println!("Creating envelopes...");
    let food_envelope = create_envelope(
        user.id,
        &NewEnvelope {
            name: "Food".to_owned(),
            ..Default::default()
        },
        connection,
    )?;
    let food_envelope_id = food_envelope.envelope.id;
    assign_budget(food_envelope_id, user.id, bank.id, 400.0, connection)?;

    println!("Recording transactions...");
    let requests = [
        TransactionRequest {
            kind: TransactionKind::Income,
            wallet_id: bank.id,
            category_id: Some(wages.id),
            amount: 1800.0,
            description: "Pay day".to_owned(),
            date: Some(today - Duration::days(14)),
            ..Default::default()
        },
        TransactionRequest {
            kind: TransactionKind::Expense,
            wallet_id: bank.id,
            envelope_id: Some(food_envelope_id),
            subcategory_id: Some(groceries.id),
            amount: 123.45,
            description: "Weekly shop".to_owned(),
            date: Some(today - Duration::days(7)),
            ..Default::default()
        },
        TransactionRequest {
            kind: TransactionKind::Expense,
            wallet_id: cash.id,
            envelope_id: Some(food_envelope_id),
            subcategory_id: Some(takeaways.id),
            amount: 24.5,
            description: "Fish and chips".to_owned(),
            date: Some(today - Duration::days(2)),
            ..Default::default()
        },
        TransactionRequest {
            kind: TransactionKind::Transfer,
            wallet_id: bank.id,
            destination_wallet_id: Some(cash.id),
            amount: 50.0,
            description: "ATM withdrawal".to_owned(),
            date: Some(today),
            ..Default::default()
        },
    ];

    for request in &requests {
        record_transaction(user.id, request, today, connection)?;
    }

    Ok(())
}
