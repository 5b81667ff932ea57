//! Built-in actions.
//!
//! General purpose actions (`approval`, `delay`, `notification`, `function`,
//! `multi_action`) and the accounts-payable set (`extract_document`,
//! `verify_invoice`, `erp`, `payment`). [`builtin_registry`] registers all of
//! them.

pub mod accounts_payable;
pub mod approval;
pub mod delay;
pub mod function;
pub mod multi;
pub mod notification;

use wflow_core::action::{ActionRegistry, BoxAction};

use accounts_payable::{ErpAction, ExtractDocumentAction, PaymentAction, VerifyInvoiceAction};
use approval::ApprovalAction;
use delay::DelayAction;
use function::FunctionAction;
use multi::MultiAction;
use notification::NotificationAction;

/// Registry with every built-in action.
///
/// `multi_action` dispatches to the other built-ins; it cannot nest itself.
pub fn builtin_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register(approval::NAME, "Approval Actions", || {
        BoxAction::new(ApprovalAction)
    });
    registry.register(delay::NAME, "Delay Actions", || BoxAction::new(DelayAction));
    registry.register(notification::NAME, "Notification Actions", || {
        BoxAction::new(NotificationAction)
    });
    registry.register(function::NAME, "Run General Function Actions", || {
        BoxAction::new(FunctionAction)
    });
    registry.register(accounts_payable::EXTRACT_DOCUMENT, "Run PDF Extraction Actions", || {
        BoxAction::new(ExtractDocumentAction)
    });
    registry.register(
        accounts_payable::VERIFY_INVOICE,
        "Invoice Verification using 2-way or 3-way",
        || BoxAction::new(VerifyInvoiceAction),
    );
    registry.register(accounts_payable::ERP, "Save Data into the ERP", || {
        BoxAction::new(ErpAction)
    });
    registry.register(accounts_payable::PAYMENT, "Trigger Payment Actions", || {
        BoxAction::new(PaymentAction)
    });

    let targets = registry.clone();
    registry.register(multi::NAME, "Run an action on multiple inputs", move || {
        BoxAction::new(MultiAction::new(targets.clone()))
    });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry();
        let names: Vec<&str> = registry.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "approval",
                "delay",
                "erp",
                "extract_document",
                "function",
                "multi_action",
                "notification",
                "payment",
                "verify_invoice",
            ]
        );
    }

    #[test]
    fn test_created_actions_report_their_registered_name() {
        let registry = builtin_registry();
        for entry in registry.iter() {
            assert_eq!(entry.create().name(), entry.name);
        }
    }
}
