//! Plain-text bodies for the messages the pipeline sends.

use std::fmt::Write as _;

use procura_core::intake::dispatch_subject;
use procura_core::requirements::Measure;
use procura_db::models::outbox::{kind, NewNotification};
use procura_db::models::proposal::Proposal;
use procura_db::models::rfp::Rfp;
use procura_db::models::vendor::Vendor;
use procura_events::OutgoingMessage;

/// The RFP invitation sent to one vendor. The subject carries the RFP
/// reference so replies can be matched back.
pub fn dispatch_message(rfp: &Rfp, vendor: &Vendor) -> OutgoingMessage {
    let mut body = String::new();
    let greeting = vendor.contact_person.as_deref().unwrap_or(&vendor.name);
    let _ = writeln!(body, "Dear {greeting},\n");
    let _ = writeln!(
        body,
        "We invite {} to submit a proposal for the following request.\n",
        vendor.name
    );
    let _ = writeln!(body, "{}\n", rfp.title);
    let _ = writeln!(body, "{}\n", rfp.description);

    let requirements = &rfp.requirements.0;
    if !requirements.items.is_empty() {
        let _ = writeln!(body, "Items:");
        for item in &requirements.items {
            let qty = item.quantity.map(|q| format!("{q} x ")).unwrap_or_default();
            match &item.specifications {
                Some(spec) => {
                    let _ = writeln!(body, "  - {qty}{} ({spec})", item.name);
                }
                None => {
                    let _ = writeln!(body, "  - {qty}{}", item.name);
                }
            }
        }
        body.push('\n');
    }

    let mut asks = Vec::new();
    for criterion in &requirements.criteria {
        let line = match &criterion.measure {
            Measure::Price { .. } => "total price".to_string(),
            Measure::DeliveryTime { max_days: Some(d) } => format!("delivery time (within {d} days)"),
            Measure::DeliveryTime { max_days: None } => "delivery time".to_string(),
            Measure::Warranty { min_months: Some(m) } => format!("warranty (at least {m} months)"),
            Measure::Warranty { min_months: None } => "warranty period".to_string(),
            Measure::PaymentTerms { expected } => format!("payment terms (we propose {expected})"),
            Measure::Specification { key, expected } => format!("{key} (required: {expected})"),
        };
        asks.push(line);
    }
    if !asks.is_empty() {
        let _ = writeln!(body, "Please state in your reply:");
        for ask in asks {
            let _ = writeln!(body, "  - {ask}");
        }
        body.push('\n');
    }

    if let Some(budget) = rfp.budget {
        let _ = writeln!(body, "Budget: {budget:.2}");
    }
    if let Some(deadline) = rfp.deadline {
        let _ = writeln!(body, "Responses due: {}", deadline.format("%Y-%m-%d %H:%M UTC"));
    }
    let _ = writeln!(
        body,
        "\nReply to this message and keep \"RFP {}\" in the subject line.",
        rfp.id
    );

    OutgoingMessage {
        to: vendor.email.clone(),
        subject: dispatch_subject(rfp.id, &rfp.title),
        body,
    }
}

/// Outbox row telling the winning vendor their proposal was accepted.
pub fn acceptance_notification(rfp: &Rfp, proposal: &Proposal, vendor: &Vendor) -> NewNotification {
    let mut body = format!(
        "Dear {},\n\nYour proposal for \"{}\" has been accepted.",
        vendor.contact_person.as_deref().unwrap_or(&vendor.name),
        rfp.title
    );
    if let Some(score) = proposal.score {
        let _ = write!(body, " It ranked with a score of {score:.1} out of 100.");
    }
    body.push_str("\n\nWe will be in touch shortly to arrange the next steps.\n");

    NewNotification {
        kind: kind::PROPOSAL_ACCEPTED.to_string(),
        recipient: vendor.email.clone(),
        subject: format!("[RFP {}] Proposal accepted: {}", rfp.id, rfp.title),
        body,
        rfp_id: Some(rfp.id),
        proposal_id: Some(proposal.id),
    }
}
