//! `actions`: what the registry offers to definitions.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use crate::state::AppState;

pub fn list_actions(state: &AppState, json: bool) -> Result<()> {
    let rows: Vec<_> = state
        .registry
        .iter()
        .map(|registered| {
            let action = registered.create();
            let inputs: Vec<String> = action
                .required_inputs()
                .into_iter()
                .map(|spec| spec.name)
                .collect();
            (registered.name.clone(), registered.label.clone(), inputs, action.produced_outputs())
        })
        .collect();

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(name, label, inputs, outputs)| {
                serde_json::json!({
                    "name": name,
                    "label": label,
                    "required_inputs": inputs,
                    "produced_outputs": outputs,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Action").fg(Color::Cyan),
            Cell::new("Label"),
            Cell::new("Inputs"),
            Cell::new("Outputs"),
        ]);
    for (name, label, inputs, outputs) in &rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(label),
            Cell::new(inputs.join(", ")),
            Cell::new(outputs.join(", ")),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}
