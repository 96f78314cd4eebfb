use std::fmt::Write;
use stockscope_core::analysis::RecommendationOutcome;
use stockscope_core::domain::portfolio::PortfolioSummary;
use stockscope_core::format;
use stockscope_core::report::StockReport;

pub fn stock_report(report: &StockReport) -> String {
    let mut out = String::new();
    let r = report.outcome.recommendation();

    let _ = writeln!(out, "{} ({})", report.name, report.symbol);
    let _ = writeln!(
        out,
        "Sector: {} | Industry: {}",
        report.sector.as_deref().unwrap_or(format::NOT_AVAILABLE),
        report.industry.as_deref().unwrap_or(format::NOT_AVAILABLE),
    );
    let _ = writeln!(
        out,
        "Current Price: {} ({})",
        format::currency(report.current_price),
        format::or_na(report.change_pct, format::percent_points),
    );

    let _ = writeln!(out, "\nKey Metrics");
    for m in &report.key_metrics {
        let _ = writeln!(out, "  {:<15} {}", m.label, m.value);
    }

    if !report.news.is_empty() {
        let _ = writeln!(out, "\nLatest News");
        for item in &report.news {
            let _ = writeln!(out, "  {}", item.title);
            let _ = writeln!(
                out,
                "    Published: {} | Source: {}",
                item.published_display(),
                item.publisher
            );
            if !item.summary.is_empty() {
                let _ = writeln!(out, "    {}", item.summary);
            }
            let _ = writeln!(out, "    {}", item.link);
        }
    }

    let _ = writeln!(out, "\nSummary\n{}", r.summary);
    let _ = writeln!(out, "\nTechnical Analysis\n{}", r.technical_analysis);
    let _ = writeln!(out, "\nFundamental Analysis\n{}", r.fundamental_analysis);
    let _ = writeln!(out, "\nRecommendation: {}", r.recommendation);
    let _ = writeln!(out, "Risk Level: {}", r.risk_level);
    let _ = writeln!(out, "{}", r.reasoning);

    if let RecommendationOutcome::InsufficientData { reason, .. } = &report.outcome {
        let _ = writeln!(out, "(fallback: {reason})");
    }

    out
}

pub fn portfolio_summary(summary: &PortfolioSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Portfolio Overview");
    let _ = writeln!(out, "  Total Value:  {}", format::currency(summary.total_value));
    let _ = writeln!(
        out,
        "  Daily Change: {}",
        format::percent_points(summary.weighted_daily_change_pct)
    );
    let _ = writeln!(out, "  Risk Level:   {}", summary.risk_level);

    let _ = writeln!(out, "\nSector Distribution");
    for (sector, pct) in &summary.sector_distribution_pct {
        let _ = writeln!(out, "  {sector:<24} {}", format::percent_points(*pct));
    }

    let _ = writeln!(out, "\nHoldings");
    for h in &summary.holdings {
        let _ = writeln!(
            out,
            "  {:<8} {:>10} shares  {:>12}  {:>16}  {:>8}",
            h.symbol,
            h.shares,
            format::currency(h.current_price),
            format::currency(h.total_value),
            format::percent_points(h.daily_change_pct),
        );
    }

    out
}
