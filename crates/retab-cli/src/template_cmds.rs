//! Template inspection commands.

use anyhow::{Result, bail};

use retab_core::TemplateRegistry;

pub fn list(registry: &TemplateRegistry) {
    for template in registry.all() {
        println!(
            "{:<16} {}  ({} columns, {} roster)",
            template.id,
            template.label,
            template.columns.len(),
            template.roster.len()
        );
    }
}

pub fn show(registry: &TemplateRegistry, id: &str) -> Result<()> {
    let Some(template) = registry.get(id) else {
        bail!("unknown template {id:?}; see `retab templates list`");
    };
    println!("id:      {}", template.id);
    println!("label:   {}", template.label);
    println!("hint:    {}", template.hint);
    println!("columns: {}", template.columns.join(", "));
    println!("roster:  {}", template.roster.join(", "));
    Ok(())
}
