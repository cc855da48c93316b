use purchase_planner::*;

fn sale(date: &str, amount: f64, supplier_id: &str, supplier_name: &str, factor: Option<f64>) -> Transaction {
    Transaction {
        date: date.to_string(),
        amount,
        supplier_id: supplier_id.to_string(),
        supplier_name: supplier_name.to_string(),
        supplier_factor: factor,
    }
}

fn demo_sales() -> Vec<Transaction> {
    let mut rows = Vec::new();

    // Steady growth, factor stored the legacy way (170 = 1.70)
    for (i, amount) in [42_000.0, 44_500.0, 43_800.0, 47_200.0, 49_900.0, 51_300.0]
        .into_iter()
        .enumerate()
    {
        rows.push(sale(
            &format!("2024-{:02}-15", i + 1),
            amount,
            "TN",
            "Toner Norte",
            Some(170.0),
        ));
    }

    // Seasonal paper supplier with a credit note in March
    rows.push(sale("2024-01-10", 18_000.0, "PS", "Papelera Sur", Some(1.82)));
    rows.push(sale("2024-03-08", 9_500.0, "PS", "Papelera Sur", Some(1.82)));
    rows.push(sale("2024-03-22", -1_200.0, "PS", "Papelera Sur", Some(1.82)));
    rows.push(sale("2024-05-30", 21_000.0, "PS", "Papelera Sur", Some(1.82)));

    // Current month, including a supplier with no history
    rows.push(sale("2024-07-03", 20_400.0, "TN", "Toner Norte", Some(170.0)));
    rows.push(sale("2024-07-05", 7_650.0, "IM", "Importadora Mar", None));

    rows
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("📦 Purchase Planner Walkthrough\n");

    let config = PlannerConfig::from_json_str(
        r#"{ "default_factor": 1.53, "trailing_months": 6, "default_method": "weighted" }"#,
    )?;
    let planner = PurchasePlanner::new(config)?;

    let source = InMemorySource::new()
        .with_sales(demo_sales())
        .with_param(DEFAULT_FACTOR_PARAM, 153.0);

    let request = planner.request("2024-07".parse()?);
    let outcome = planner.plan_from_source(&source, &request).await?;

    println!("🗓️  Window: {}", outcome.window.caption());
    println!("🎯 Planning month: {}", outcome.target_month);
    println!("⚙️  Default factor: {:.2}\n", outcome.default_factor);

    println!(
        "{:<18} {:>7} {:>12} {:>12} {:>12} {:>12}",
        "Supplier", "Factor", "Forecast", "Proposed", "Restock", "Mix"
    );
    println!("{}", "-".repeat(78));
    for line in &outcome.plan.lines {
        let marker = match line.basis {
            PlanLineBasis::Forecast => "",
            PlanLineBasis::RestockOnly => " *",
        };
        println!(
            "{:<18} {:>7.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}{}",
            line.supplier_name,
            line.factor,
            line.forecast_next,
            line.proposed_cost,
            line.restock_cost,
            line.mix_cost,
            marker
        );
    }
    println!("{}", "-".repeat(78));
    let totals = &outcome.plan.totals;
    println!(
        "{:<18} {:>7} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
        "TOTAL", "", totals.forecast, totals.proposed, totals.restock, totals.mix
    );
    println!("  * no sales in the window, restock only\n");

    println!("📈 Three-month projection by method:");
    for method in ForecastMethod::ALL {
        let report = planner.project(&request.clone().with_method(method), &demo_sales(), 3)?;
        println!(
            "  {:<9} next month {:>12.2}   next 3 months {:>12.2}",
            method, report.total_next_month, report.total_horizon
        );
    }

    let snapshot = planner.snapshot(&request, &outcome)?;
    println!("\n💾 Saved plan:\n{}", snapshot.to_json()?);

    Ok(())
}
