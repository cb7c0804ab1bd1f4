//! Invoice and payment ledger.

use crate::error::ClinicError;
use crate::models::{
    validate_amount, EntityKind, Invoice, InvoiceStatus, NewInvoice, NewPayment, Payment,
};
use crate::services::metrics::{record_invoice_created, record_payment};
use crate::services::store::{ClinicStore, PaymentOutcome};
use crate::services::validator::{Reference, ReferenceValidator};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn ClinicStore>,
    validator: ReferenceValidator,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            validator: ReferenceValidator::new(store.clone()),
            store,
        }
    }

    /// Issue a draft invoice carrying the company's next invoice number.
    #[instrument(skip(self, input), fields(company_id = input.company_id, patient_id = input.patient_id))]
    pub async fn create_invoice(&self, mut input: NewInvoice) -> Result<Invoice, ClinicError> {
        input.total_amount = validate_amount("total_amount", input.total_amount)?;

        self.validator
            .validate(&[
                Reference::exists(EntityKind::Company, input.company_id),
                Reference::owned_by(EntityKind::Patient, input.patient_id, input.company_id),
            ])
            .await?;

        let invoice = self.store.insert_invoice(&input).await?;
        record_invoice_created();

        info!(
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice issued"
        );
        Ok(invoice)
    }

    /// Record a payment and fold it into the invoice's paid amount.
    ///
    /// Neither over-payment nor payment against a cancelled invoice is
    /// refused, and reaching the total does not mark the invoice paid. The
    /// one ceiling is the amount column: a payment that would push the paid
    /// amount past `MAX_AMOUNT` is rejected as an invalid amount.
    #[instrument(skip(self, input), fields(invoice_id = input.invoice_id))]
    pub async fn record_payment(
        &self,
        mut input: NewPayment,
    ) -> Result<(Payment, Invoice), ClinicError> {
        input.amount = validate_amount("amount", input.amount)?;
        input.validate()?;

        self.validator
            .validate(&[Reference::exists(EntityKind::Invoice, input.invoice_id)])
            .await?;

        let (payment, invoice) = match self.store.record_payment(&input).await? {
            PaymentOutcome::Applied { payment, invoice } => (payment, invoice),
            PaymentOutcome::InvoiceMissing => {
                return Err(ClinicError::NotFound {
                    kind: EntityKind::Invoice,
                    id: input.invoice_id,
                })
            }
            PaymentOutcome::PaidAmountOverflow => {
                return Err(ClinicError::invalid_amount(
                    "amount would take the invoice's paid amount past the largest storable value",
                ))
            }
        };

        record_payment(payment.payment_method.as_str(), payment.amount);

        info!(
            payment_id = payment.id,
            paid_amount = %invoice.paid_amount,
            balance_due = %invoice.balance_due(),
            "Payment applied"
        );
        Ok((payment, invoice))
    }

    pub async fn get_invoice(&self, invoice_id: i64) -> Result<Invoice, ClinicError> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or(ClinicError::NotFound {
                kind: EntityKind::Invoice,
                id: invoice_id,
            })
    }

    #[instrument(skip(self))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: i64,
        status: InvoiceStatus,
    ) -> Result<Invoice, ClinicError> {
        let current = self.get_invoice(invoice_id).await?;
        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(ClinicError::InvalidTransition {
                entity: EntityKind::Invoice,
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        match self
            .store
            .update_invoice_status(invoice_id, current.status, status)
            .await?
        {
            Some(invoice) => {
                info!(from = %current.status, to = %status, "Invoice status changed");
                Ok(invoice)
            }
            None => {
                // Lost a race with another status change.
                let latest = self.get_invoice(invoice_id).await?;
                Err(ClinicError::InvalidTransition {
                    entity: EntityKind::Invoice,
                    from: latest.status.to_string(),
                    to: status.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCompany, NewPatient, PaymentMethod};
    use crate::services::memory::InMemoryStore;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    struct Fixture {
        ledger: LedgerEngine,
        company_a: i64,
        company_b: i64,
        patient_a: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let mut companies = Vec::new();
        for name in ["North", "South"] {
            let company = store
                .insert_company(&NewCompany {
                    name: name.to_string(),
                    address: "1 Main St".to_string(),
                    phone: "555-0100".to_string(),
                    email: "desk@clinic.example".to_string(),
                    license_number: format!("LIC-{}", name),
                })
                .await
                .unwrap();
            companies.push(company.id);
        }
        let patient = store
            .insert_patient(&NewPatient {
                company_id: companies[0],
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: None,
                phone: "555-0101".to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                address: "2 Side St".to_string(),
                insurance_number: None,
                emergency_contact: None,
            })
            .await
            .unwrap();

        Fixture {
            ledger: LedgerEngine::new(store),
            company_a: companies[0],
            company_b: companies[1],
            patient_a: patient.id,
        }
    }

    fn invoice_for(patient_id: i64, company_id: i64, total: &str) -> NewInvoice {
        NewInvoice {
            patient_id,
            company_id,
            total_amount: dec(total),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            notes: None,
        }
    }

    fn payment_for(invoice_id: i64, amount: &str) -> NewPayment {
        NewPayment {
            invoice_id,
            amount: dec(amount),
            payment_method: PaymentMethod::Card,
            payment_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            reference_number: Some("TX-1".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_invoice_then_payment() {
        let f = fixture().await;
        let invoice = f
            .ledger
            .create_invoice(invoice_for(f.patient_a, f.company_a, "250.75"))
            .await
            .unwrap();
        assert_eq!(invoice.invoice_number, format!("INV-{}-0001", f.company_a));
        assert_eq!(invoice.paid_amount, Decimal::ZERO);
        assert_eq!(invoice.status, InvoiceStatus::Draft);

        let (payment, invoice) = f
            .ledger
            .record_payment(payment_for(invoice.id, "100.00"))
            .await
            .unwrap();
        assert_eq!(payment.amount, dec("100.00"));
        assert_eq!(invoice.paid_amount, dec("100.00"));
        assert_eq!(invoice.balance_due(), dec("150.75"));
    }

    #[tokio::test]
    async fn test_patient_from_other_tenant_rejected() {
        let f = fixture().await;
        let err = f
            .ledger
            .create_invoice(invoice_for(f.patient_a, f.company_b, "10.00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "tenant_mismatch");
    }

    #[tokio::test]
    async fn test_non_positive_total_rejected_before_lookup() {
        let f = fixture().await;
        let err = f
            .ledger
            .create_invoice(invoice_for(999, 999, "0"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_amount");
    }

    #[tokio::test]
    async fn test_payment_against_missing_invoice() {
        let f = fixture().await;
        let err = f
            .ledger
            .record_payment(payment_for(42, "5.00"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invoice_not_found");
    }

    #[tokio::test]
    async fn test_overpayment_is_accepted() {
        let f = fixture().await;
        let invoice = f
            .ledger
            .create_invoice(invoice_for(f.patient_a, f.company_a, "50.00"))
            .await
            .unwrap();
        let (_, invoice) = f
            .ledger
            .record_payment(payment_for(invoice.id, "80.00"))
            .await
            .unwrap();
        assert_eq!(invoice.balance_due(), dec("-30.00"));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn test_paid_amount_overflow_is_invalid_amount() {
        let f = fixture().await;
        let invoice = f
            .ledger
            .create_invoice(invoice_for(f.patient_a, f.company_a, "50.00"))
            .await
            .unwrap();
        f.ledger
            .record_payment(payment_for(invoice.id, "9999999999.99"))
            .await
            .unwrap();

        let err = f
            .ledger
            .record_payment(payment_for(invoice.id, "0.01"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_amount");

        let invoice = f.ledger.get_invoice(invoice.id).await.unwrap();
        assert_eq!(invoice.paid_amount, dec("9999999999.99"));
    }

    #[tokio::test]
    async fn test_reference_number_longer_than_column_rejected() {
        let f = fixture().await;
        let invoice = f
            .ledger
            .create_invoice(invoice_for(f.patient_a, f.company_a, "50.00"))
            .await
            .unwrap();

        let mut payment = payment_for(invoice.id, "10.00");
        payment.reference_number = Some("R".repeat(101));
        let err = f.ledger.record_payment(payment).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");

        let mut payment = payment_for(invoice.id, "10.00");
        payment.reference_number = Some("R".repeat(100));
        let (_, invoice) = f.ledger.record_payment(payment).await.unwrap();
        assert_eq!(invoice.paid_amount, dec("10.00"));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let f = fixture().await;
        let invoice = f
            .ledger
            .create_invoice(invoice_for(f.patient_a, f.company_a, "50.00"))
            .await
            .unwrap();

        let err = f
            .ledger
            .update_invoice_status(invoice.id, InvoiceStatus::Paid)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_transition");

        let sent = f
            .ledger
            .update_invoice_status(invoice.id, InvoiceStatus::Sent)
            .await
            .unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);

        let again = f
            .ledger
            .update_invoice_status(invoice.id, InvoiceStatus::Sent)
            .await
            .unwrap();
        assert_eq!(again.status, InvoiceStatus::Sent);

        let paid = f
            .ledger
            .update_invoice_status(invoice.id, InvoiceStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
    }
}
