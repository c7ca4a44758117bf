//! Turning the final record into delivery-channel text.
//!
//! The chunked pipeline narrates in two model passes (record to prose, prose to
//! channel message). The OCR pipeline renders a fixed template instead; its
//! caption order is part of the output contract and must not change.

use tracing::warn;

use crate::llm::ChatClient;
use crate::prompts::{build_channel_prompt, build_summary_prompt};
use crate::schema::{ContactPerson, LotInfo, SCALAR_FIELDS, TenderRecord};

// The lots block renders before this caption index, the contacts block before the next one.
const LOTS_POSITION: usize = 4;
const CONTACTS_POSITION: usize = 6;

const LOTS_CAPTION: &str = "🏷️ *Lots*";
const CONTACTS_CAPTION: &str = "👤 *Contact persons*";

/// Generate the channel narrative via two sequential model passes.
///
/// Failure of the first pass yields no narrative; failure of the second falls
/// back to the prose from the first. Neither failure escalates.
pub(crate) async fn narrate(chat: &dyn ChatClient, record: &TenderRecord) -> Option<String> {
    let record_json = serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string());
    let prose = match chat.complete_text(&build_summary_prompt(&record_json)).await {
        Ok(prose) => prose,
        Err(error) => {
            warn!(error = %error, "Summary narration failed; omitting narrative");
            return None;
        }
    };
    match chat.complete_text(&build_channel_prompt(&prose)).await {
        Ok(message) => Some(message),
        Err(error) => {
            warn!(error = %error, "Channel formatting failed; delivering raw summary");
            Some(prose)
        }
    }
}

/// Render the fixed channel template for a record.
///
/// Non-empty scalar fields become one paragraph each in caption order; empty
/// fields are omitted. The lots and contact blocks are interleaved at their
/// fixed positions and dropped entirely when no entry has content.
pub(crate) fn render_channel_message(record: &TenderRecord) -> String {
    let mut sections = Vec::new();
    for (index, field) in SCALAR_FIELDS.iter().enumerate() {
        if index == LOTS_POSITION {
            if let Some(block) = render_lots(&record.lots) {
                sections.push(block);
            }
        }
        if index == CONTACTS_POSITION {
            if let Some(block) = render_contacts(&record.contact_persons) {
                sections.push(block);
            }
        }
        let value = (field.get)(record);
        if !value.is_empty() {
            sections.push(format!("{}: {value}", field.caption));
        }
    }
    sections.join("\n\n")
}

fn render_lots(lots: &[LotInfo]) -> Option<String> {
    let mut blocks = Vec::new();
    for (index, lot) in lots.iter().enumerate() {
        let mut details = Vec::new();
        if !lot.name.is_empty() {
            details.push(format!("Name: {}", lot.name));
        }
        if !lot.initial_max_price.is_empty() {
            details.push(format!("Initial maximum price: {}", lot.initial_max_price));
        }
        if !lot.currency.is_empty() {
            details.push(format!("Currency: {}", lot.currency));
        }
        if !lot.quantity.is_empty() {
            details.push(format!("Quantity: {}", lot.quantity));
        }
        if details.is_empty() {
            continue;
        }
        blocks.push(format!("Lot {}:\n  - {}", index + 1, details.join("\n  - ")));
    }
    if blocks.is_empty() {
        return None;
    }
    Some(format!("{LOTS_CAPTION}:\n{}", blocks.join("\n")))
}

fn render_contacts(persons: &[ContactPerson]) -> Option<String> {
    let mut entries = Vec::new();
    for person in persons {
        let mut details = Vec::new();
        if !person.full_name.is_empty() {
            details.push(format!("Full name: {}", person.full_name));
        }
        if !person.phone_number.is_empty() {
            details.push(format!("📞 Phone: {}", person.phone_number));
        }
        if !person.email.is_empty() {
            details.push(format!("📧 Email: {}", person.email));
        }
        if !person.position.is_empty() {
            details.push(format!("💼 Position: {}", person.position));
        }
        if details.is_empty() {
            continue;
        }
        // The first present detail heads the entry; the rest nest under it.
        entries.push(format!("  - {}", details.join("\n    - ")));
    }
    if entries.is_empty() {
        return None;
    }
    Some(format!("{CONTACTS_CAPTION}:\n{}", entries.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::ScriptedChat;
    use crate::llm::ChatError;

    fn full_record() -> TenderRecord {
        let mut record = TenderRecord::default();
        for (index, field) in SCALAR_FIELDS.iter().enumerate() {
            (field.set)(&mut record, format!("value-{index}"));
        }
        record.lots = vec![LotInfo {
            name: "Office chairs".into(),
            initial_max_price: "100000".into(),
            currency: "RUB".into(),
            quantity: "40".into(),
        }];
        record.contact_persons = vec![ContactPerson {
            full_name: "Petrova A. I.".into(),
            phone_number: "+7 900 000-00-00".into(),
            email: "petrova@example.com".into(),
            position: "Procurement lead".into(),
        }];
        record
    }

    #[test]
    fn template_preserves_caption_order_and_block_positions() {
        let message = render_channel_message(&full_record());
        let sections: Vec<&str> = message.split("\n\n").collect();

        assert_eq!(sections.len(), SCALAR_FIELDS.len() + 2);
        assert!(sections[0].starts_with("📦 *Procurement name*:"));
        assert!(sections[LOTS_POSITION].starts_with(LOTS_CAPTION));
        assert!(sections[CONTACTS_POSITION + 1].starts_with(CONTACTS_CAPTION));

        let mut expected_captions = Vec::new();
        for (index, field) in SCALAR_FIELDS.iter().enumerate() {
            if index == LOTS_POSITION {
                expected_captions.push(LOTS_CAPTION);
            }
            if index == CONTACTS_POSITION {
                expected_captions.push(CONTACTS_CAPTION);
            }
            expected_captions.push(field.caption);
        }
        for (section, caption) in sections.iter().zip(expected_captions) {
            assert!(
                section.starts_with(caption),
                "expected {caption:?} at {section:?}"
            );
        }
    }

    #[test]
    fn template_omits_empty_fields_entirely() {
        let record = TenderRecord {
            procurement_name: "Laptops".into(),
            delivery_address: "Moscow".into(),
            ..TenderRecord::default()
        };
        let message = render_channel_message(&record);
        assert_eq!(
            message,
            "📦 *Procurement name*: Laptops\n\n📍 *Delivery address*: Moscow"
        );
    }

    #[test]
    fn template_renders_lot_sub_bullets_for_populated_fields_only() {
        let record = TenderRecord {
            lots: vec![LotInfo {
                name: "Paper".into(),
                quantity: "10".into(),
                ..LotInfo::default()
            }],
            ..TenderRecord::default()
        };
        let message = render_channel_message(&record);
        assert_eq!(
            message,
            "🏷️ *Lots*:\nLot 1:\n  - Name: Paper\n  - Quantity: 10"
        );
    }

    #[test]
    fn contact_without_a_name_heads_the_entry_with_its_first_detail() {
        let record = TenderRecord {
            contact_persons: vec![ContactPerson {
                phone_number: "+7 900 111-22-33".into(),
                email: "office@example.com".into(),
                ..ContactPerson::default()
            }],
            ..TenderRecord::default()
        };
        let message = render_channel_message(&record);
        assert_eq!(
            message,
            "👤 *Contact persons*:\n  - 📞 Phone: +7 900 111-22-33\n    - 📧 Email: office@example.com"
        );
    }

    #[test]
    fn blocks_with_only_empty_entries_are_dropped() {
        let record = TenderRecord {
            procurement_name: "Laptops".into(),
            lots: vec![LotInfo::default()],
            contact_persons: vec![ContactPerson::default()],
            ..TenderRecord::default()
        };
        assert_eq!(
            render_channel_message(&record),
            "📦 *Procurement name*: Laptops"
        );
    }

    #[tokio::test]
    async fn narration_runs_both_passes_in_order() {
        let chat = ScriptedChat::new(vec![
            Ok("A tender for laptops.".into()),
            Ok("📦 Laptops tender announcement".into()),
        ]);
        let record = TenderRecord {
            procurement_name: "Laptops".into(),
            ..TenderRecord::default()
        };

        let summary = narrate(&chat, &record).await;

        assert_eq!(summary.as_deref(), Some("📦 Laptops tender announcement"));
        let prompts = chat.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("\"procurement_name\": \"Laptops\""));
        assert!(prompts[1].contains("A tender for laptops."));
    }

    #[tokio::test]
    async fn failed_first_pass_yields_no_narrative() {
        let chat = ScriptedChat::new(vec![Err(ChatError::GenerationFailed("down".into()))]);
        let summary = narrate(&chat, &TenderRecord::default()).await;
        assert!(summary.is_none());
        assert_eq!(chat.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_second_pass_falls_back_to_prose() {
        let chat = ScriptedChat::new(vec![
            Ok("Prose summary.".into()),
            Err(ChatError::GenerationFailed("down".into())),
        ]);
        let summary = narrate(&chat, &TenderRecord::default()).await;
        assert_eq!(summary.as_deref(), Some("Prose summary."));
    }
}
