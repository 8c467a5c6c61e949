use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("invalid period tag: {tag}")]
    InvalidPeriod {
        tag: String,
    },

    #[error("invalid {field} day-of-month: {day}")]
    InvalidCycleDay {
        field: &'static str,
        day: u32,
    },

    #[error("invalid amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("statement already recorded for account {account_id} on {statement_date}")]
    StoreConflict {
        account_id: Uuid,
        statement_date: NaiveDate,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StatementError>;
