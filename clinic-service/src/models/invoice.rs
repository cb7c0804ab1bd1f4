//! Ledger records: invoices and the payments applied to them.

use super::{datetime_to_timestamp, format_amount};
use crate::grpc::proto;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Invoice status.
///
/// `draft -> sent -> paid`, `sent -> overdue -> paid`; anything not yet
/// paid can be cancelled. Paying an invoice in full does not move it to
/// `paid` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::InvoiceStatus::try_from(value).ok()? {
            proto::InvoiceStatus::Unspecified => None,
            proto::InvoiceStatus::Draft => Some(Self::Draft),
            proto::InvoiceStatus::Sent => Some(Self::Sent),
            proto::InvoiceStatus::Paid => Some(Self::Paid),
            proto::InvoiceStatus::Overdue => Some(Self::Overdue),
            proto::InvoiceStatus::Cancelled => Some(Self::Cancelled),
        }
    }

    pub fn to_proto(self) -> i32 {
        let status = match self {
            Self::Draft => proto::InvoiceStatus::Draft,
            Self::Sent => proto::InvoiceStatus::Sent,
            Self::Paid => proto::InvoiceStatus::Paid,
            Self::Overdue => proto::InvoiceStatus::Overdue,
            Self::Cancelled => proto::InvoiceStatus::Cancelled,
        };
        status as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn valid_transitions(&self) -> &'static [InvoiceStatus] {
        use InvoiceStatus::*;
        match self {
            Draft => &[Sent, Cancelled],
            Sent => &[Paid, Overdue, Cancelled],
            Overdue => &[Paid, Cancelled],
            Paid | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub patient_id: i64,
    pub company_id: i64,
    pub invoice_number: String,
    pub total_amount: Decimal,
    /// Always the sum of every payment recorded against this invoice.
    pub paid_amount: Decimal,
    pub status: InvoiceStatus,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Amount still owed. Negative when the invoice has been overpaid.
    pub fn balance_due(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub patient_id: i64,
    pub company_id: i64,
    pub total_amount: Decimal,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

impl From<Invoice> for proto::Invoice {
    fn from(i: Invoice) -> Self {
        Self {
            id: i.id,
            patient_id: i.patient_id,
            company_id: i.company_id,
            invoice_number: i.invoice_number,
            total_amount: format_amount(i.total_amount),
            paid_amount: format_amount(i.paid_amount),
            status: i.status.to_proto(),
            due_date: i.due_date.to_string(),
            notes: i.notes,
            created_at: Some(datetime_to_timestamp(i.created_at)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Insurance,
}

impl PaymentMethod {
    pub fn from_proto(value: i32) -> Option<Self> {
        match proto::PaymentMethod::try_from(value).ok()? {
            proto::PaymentMethod::Unspecified => None,
            proto::PaymentMethod::Cash => Some(Self::Cash),
            proto::PaymentMethod::Card => Some(Self::Card),
            proto::PaymentMethod::BankTransfer => Some(Self::BankTransfer),
            proto::PaymentMethod::Insurance => Some(Self::Insurance),
        }
    }

    pub fn to_proto(self) -> i32 {
        let method = match self {
            Self::Cash => proto::PaymentMethod::Cash,
            Self::Card => proto::PaymentMethod::Card,
            Self::BankTransfer => proto::PaymentMethod::BankTransfer,
            Self::Insurance => proto::PaymentMethod::Insurance,
        };
        method as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::Insurance => "insurance",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment. Append-only; never edited once recorded.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub invoice_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Validate)]
pub struct NewPayment {
    pub invoice_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_date: NaiveDate,
    #[validate(length(max = 100, message = "Reference number is too long"))]
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

impl From<Payment> for proto::Payment {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            invoice_id: p.invoice_id,
            amount: format_amount(p.amount),
            payment_method: p.payment_method.to_proto(),
            payment_date: p.payment_date.to_string(),
            reference_number: p.reference_number,
            notes: p.notes,
            created_at: Some(datetime_to_timestamp(p.created_at)),
        }
    }
}
