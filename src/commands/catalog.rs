use crate::billing::{Catalog, ProductItem};
use crate::error::{Result, StudySphereError};
use colored::Colorize;
use prettytable::{format, Table};

fn price_label(monthly: Option<f64>) -> String {
    match monthly {
        Some(price) => format!("${:.2}/month", price),
        None => "Free".to_string(),
    }
}

fn feature_label(catalog: &Catalog, item: &ProductItem) -> Option<String> {
    let ProductItem::Feature {
        feature_id,
        included_usage,
        ..
    } = item
    else {
        return None;
    };
    let name = catalog
        .feature(feature_id)
        .map(|f| f.name)
        .unwrap_or(*feature_id)
        .to_string();
    Some(match included_usage {
        Some(n) => format!("{} ({}/month)", name, n),
        None => name,
    })
}

/// Render the catalog as a table
pub fn render_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(prettytable::row![
        "Product".bold(),
        "ID".bold(),
        "Price".bold(),
        "Features".bold()
    ]);

    for product in &catalog.products {
        let features: Vec<String> = product
            .items
            .iter()
            .filter_map(|item| feature_label(catalog, item))
            .collect();
        let name = if product.is_default {
            format!("{} (default)", product.name)
        } else {
            product.name.to_string()
        };
        table.add_row(prettytable::row![
            name,
            product.id.cyan(),
            price_label(product.monthly_price()),
            features.join("\n")
        ]);
    }

    table
}

/// Handle `studysphere catalog`
pub fn print_catalog(json: bool) -> Result<()> {
    let catalog = Catalog::standard();
    catalog.validate()?;

    if json {
        let out = serde_json::to_string_pretty(&catalog).map_err(StudySphereError::from)?;
        println!("{}", out);
    } else {
        println!("\nStudySphere plans:\n");
        render_table(&catalog).printstd();
        println!();
    }
    Ok(())
}
