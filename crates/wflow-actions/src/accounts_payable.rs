//! Accounts-payable actions.
//!
//! Extraction, verification, ERP and payment are simulated: extraction
//! returns fixed documents per `document_type`, the ERP and payment steps log
//! what they would have done.

use serde_json::{Value, json};
use wflow_core::action::{Action, ActionError, ActionOutcome, InputSpec, require_str};
use wflow_types::workflow::Variables;

pub const EXTRACT_DOCUMENT: &str = "extract_document";
pub const VERIFY_INVOICE: &str = "verify_invoice";
pub const ERP: &str = "erp";
pub const PAYMENT: &str = "payment";

pub const PDF_FILE: &str = "pdf_file";
pub const DOCUMENT_TYPE: &str = "document_type";
pub const DATA: &str = "data";
pub const INVOICE_DATA: &str = "invoice_data";
pub const PURCHASE_ORDER_DATA: &str = "purchase_order_data";
pub const VERIFIED: &str = "verified";
pub const METHOD: &str = "method";
pub const PAYMENT_STATUS: &str = "payment_status";
pub const SAVED: &str = "saved";
pub const TRIGGERED: &str = "triggered";

fn optional_str<'a>(inputs: &'a Variables, key: &str) -> Option<&'a str> {
    inputs.get(key).and_then(Value::as_str)
}

fn po_number<'a>(inputs: &'a Variables, key: &str) -> Result<&'a Value, ActionError> {
    inputs
        .get(key)
        .and_then(|doc| doc.get("po_number"))
        .ok_or_else(|| ActionError::invalid_input(key, "no po_number"))
}

// ---------------------------------------------------------------------------
// extract_document
// ---------------------------------------------------------------------------

pub struct ExtractDocumentAction;

impl Action for ExtractDocumentAction {
    fn name(&self) -> &str {
        EXTRACT_DOCUMENT
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::new(PDF_FILE, "PDF File to extract text from")]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![DATA.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let file = require_str(inputs, PDF_FILE)?;
        let document_type = optional_str(inputs, DOCUMENT_TYPE).unwrap_or_default();

        let data = match document_type {
            "INVOICE" => json!({"po_number": 123, "inv_amount": 1235.00}),
            "PO" => json!({"po_number": 123, "grn_numbers": [1, 2, 3]}),
            "GRN" => json!({"grn_number": 1, "po_number": 123}),
            other => {
                return Ok(ActionOutcome::failed(format!("Unknown Document type {other}"))
                    .with_output(DATA, json!({})));
            }
        };

        tracing::info!(file, document_type, data = %data, "extracted document");
        Ok(ActionOutcome::completed().with_output(DATA, data))
    }
}

// ---------------------------------------------------------------------------
// verify_invoice
// ---------------------------------------------------------------------------

/// Two-way match of an invoice against its purchase order.
pub struct VerifyInvoiceAction;

impl Action for VerifyInvoiceAction {
    fn name(&self) -> &str {
        VERIFY_INVOICE
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::new(INVOICE_DATA, "Invoice Data"),
            InputSpec::new(PURCHASE_ORDER_DATA, "PO Data"),
        ]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![VERIFIED.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let invoice_po = po_number(inputs, INVOICE_DATA)?;
        let order_po = po_number(inputs, PURCHASE_ORDER_DATA)?;

        if invoice_po == order_po {
            tracing::info!(po_number = %order_po, "invoice verified");
            Ok(ActionOutcome::completed().with_output(VERIFIED, true))
        } else {
            tracing::info!(invoice_po = %invoice_po, order_po = %order_po, "invoice verification failed");
            Ok(ActionOutcome::failed(format!(
                "PO number mismatch: invoice {invoice_po}, purchase order {order_po}"
            ))
            .with_output(VERIFIED, false))
        }
    }
}

// ---------------------------------------------------------------------------
// erp
// ---------------------------------------------------------------------------

pub struct ErpAction;

impl Action for ErpAction {
    fn name(&self) -> &str {
        ERP
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::new(INVOICE_DATA, "Invoice Data")]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![SAVED.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let document_type = optional_str(inputs, DOCUMENT_TYPE).unwrap_or_default();
        let method = optional_str(inputs, METHOD).unwrap_or_default();
        let invoice = inputs.get(INVOICE_DATA).cloned().unwrap_or(Value::Null);

        match (document_type, method) {
            ("INVOICE", "SAVE") => {
                tracing::info!(invoice = %invoice, "saved invoice");
                Ok(ActionOutcome::completed().with_output(SAVED, true))
            }
            ("INVOICE", "UPDATE_STATUS") => {
                let payment_status = optional_str(inputs, PAYMENT_STATUS).unwrap_or("UNKNOWN");
                tracing::info!(invoice = %invoice, payment_status, "updated invoice");
                Ok(ActionOutcome::completed().with_output(SAVED, true))
            }
            _ => {
                tracing::info!(document_type, method, "unknown ERP document type");
                Ok(ActionOutcome::failed("Unknown ERP Document Type").with_output(SAVED, false))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// payment
// ---------------------------------------------------------------------------

pub struct PaymentAction;

impl Action for PaymentAction {
    fn name(&self) -> &str {
        PAYMENT
    }

    fn required_inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::new(INVOICE_DATA, "Invoice Data")]
    }

    fn produced_outputs(&self) -> Vec<String> {
        vec![TRIGGERED.to_string()]
    }

    async fn run(&self, inputs: &Variables) -> Result<ActionOutcome, ActionError> {
        let amount = inputs
            .get(INVOICE_DATA)
            .and_then(|invoice| invoice.get("inv_amount"))
            .cloned()
            .unwrap_or(Value::Null);
        tracing::info!(amount = %amount, "payment triggered");
        Ok(ActionOutcome::completed().with_output(TRIGGERED, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wflow_types::workflow::RunStatus;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_extract_by_document_type() {
        let invoice = ExtractDocumentAction
            .run(&vars(json!({"pdf_file": "inv.pdf", "document_type": "INVOICE"})))
            .await
            .unwrap();
        assert_eq!(invoice.status, RunStatus::Completed);
        assert_eq!(invoice.outputs[DATA]["inv_amount"], json!(1235.0));

        let po = ExtractDocumentAction
            .run(&vars(json!({"pdf_file": "po.pdf", "document_type": "PO"})))
            .await
            .unwrap();
        assert_eq!(po.outputs[DATA]["grn_numbers"], json!([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_extract_unknown_type_fails() {
        let outcome = ExtractDocumentAction
            .run(&vars(json!({"pdf_file": "x.pdf", "document_type": "MEMO"})))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.reason.as_deref(), Some("Unknown Document type MEMO"));
        assert_eq!(outcome.outputs[DATA], json!({}));
    }

    #[tokio::test]
    async fn test_verify_matching_po() {
        let outcome = VerifyInvoiceAction
            .run(&vars(json!({
                "invoice_data": {"po_number": 123},
                "purchase_order_data": {"po_number": 123}
            })))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.outputs[VERIFIED], json!(true));
    }

    #[tokio::test]
    async fn test_verify_mismatch_fails() {
        let outcome = VerifyInvoiceAction
            .run(&vars(json!({
                "invoice_data": {"po_number": 123},
                "purchase_order_data": {"po_number": 999}
            })))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.outputs[VERIFIED], json!(false));
        let reason = outcome.reason.unwrap();
        assert!(reason.contains("999"), "got: {reason}");
    }

    #[tokio::test]
    async fn test_verify_without_po_number_is_invalid() {
        let err = VerifyInvoiceAction
            .run(&vars(json!({"invoice_data": {}, "purchase_order_data": {"po_number": 1}})))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invoice_data"), "got: {msg}");
    }

    #[tokio::test]
    async fn test_erp_methods() {
        for method in ["SAVE", "UPDATE_STATUS"] {
            let outcome = ErpAction
                .run(&vars(json!({
                    "invoice_data": {"po_number": 123},
                    "document_type": "INVOICE",
                    "method": method,
                    "payment_status": "PAID"
                })))
                .await
                .unwrap();
            assert_eq!(outcome.status, RunStatus::Completed, "method {method}");
            assert_eq!(outcome.outputs[SAVED], json!(true));
        }

        let outcome = ErpAction
            .run(&vars(json!({"invoice_data": {}, "document_type": "PO", "method": "SAVE"})))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.reason.as_deref(), Some("Unknown ERP Document Type"));
    }

    #[tokio::test]
    async fn test_payment_triggers() {
        let outcome = PaymentAction
            .run(&vars(json!({"invoice_data": {"inv_amount": 10.0}})))
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.outputs[TRIGGERED], json!(true));
    }
}
