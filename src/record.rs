//! Flat CRM record for a proposal, and its CSV export.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde_json::{Map, Value};

use crate::proposal::Proposal;

/// How a source value is converted before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Stored unchanged.
    Copy,
    /// Rounded to a whole number.
    Round,
    /// Rounded to two decimals.
    Cents,
    /// Divided by 1000 and rounded to two decimals (W → kW).
    Kilo,
}

impl Transform {
    fn apply(self, value: &Value) -> Value {
        let Some(n) = value.as_f64() else {
            return value.clone();
        };
        match self {
            Self::Copy => value.clone(),
            Self::Round => Value::from(n.round() as i64),
            Self::Cents => Value::from((n * 100.0).round() / 100.0),
            Self::Kilo => Value::from((n / 10.0).round() / 100.0),
        }
    }
}

/// One entry of the mapping table: dotted source path, target key, transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub source: &'static str,
    pub target: &'static str,
    pub transform: Transform,
}

const fn map(source: &'static str, target: &'static str, transform: Transform) -> FieldMapping {
    FieldMapping {
        source,
        target,
        transform,
    }
}

/// Proposal-level fields.
pub const FIELD_MAP: &[FieldMapping] = &[
    map("metadata.quote_date", "fecha_cotizacion", Transform::Copy),
    map("metadata.tariff_code", "tarifa", Transform::Copy),
    map("metadata.family", "familia_tarifa", Transform::Copy),
    map("metadata.tariff_guessed", "tarifa_estimada", Transform::Copy),
    map("metadata.periodicity", "periodicidad", Transform::Copy),
    map("metadata.dac_monthly_threshold_kwh", "limite_dac_mensual", Transform::Round),
    map("metadata.solar_hours", "horas_sol", Transform::Cents),
    map("metadata.consumption_source", "fuente_consumo", Transform::Copy),
    map("consumption.baseline_kwh", "kwh_consumidos", Transform::Round),
    map("consumption.extra_kwh", "kwh_cargas_extra", Transform::Round),
    map("hypothetical.dac_current", "pago_dac_hipotetico", Transform::Cents),
    map("hypothetical.dac_with_extra", "pago_dac_hipotetico_extra", Transform::Cents),
    map("hypothetical.exceeds_dac_threshold", "alerta_dac", Transform::Copy),
    map("with_extra.status", "estado_escenario_extra", Transform::Copy),
];

/// Per-scenario fields, relative to the scenario. The extra-load scenario
/// stores them with an `_extra` suffix.
pub const SCENARIO_MAP: &[FieldMapping] = &[
    map("period_kwh", "kwh_escenario", Transform::Round),
    map("system.panel.model", "modelo_panel", Transform::Copy),
    map("system.panel.watts", "potencia_panel", Transform::Copy),
    map("system.panel_count", "numero_paneles", Transform::Copy),
    map("system.array_watts", "potencia_sistema_kw", Transform::Kilo),
    map("system.inverter.topology", "topologia", Transform::Copy),
    map("system.inverter.model", "inversor", Transform::Copy),
    map("system.inverter.requires_trunk", "requiere_cable_troncal", Transform::Copy),
    map("system.mounting.model", "montaje", Transform::Copy),
    map("system.roof_area_m2", "area_techo_m2", Transform::Round),
    map("system.annual_generation_kwh", "generacion_anual_kwh", Transform::Round),
    map("financials.costs_total", "costo_total", Transform::Round),
    map("financials.list_price", "precio_lista", Transform::Round),
    map("financials.discount", "descuento", Transform::Round),
    map("financials.subtotal", "subtotal", Transform::Round),
    map("financials.tax", "iva", Transform::Round),
    map("financials.total", "total", Transform::Round),
    map("financials.gross_profit", "utilidad_bruta", Transform::Round),
    map("financials.gross_profit_post_cac", "utilidad_post_cac", Transform::Round),
    map("financials.usd_per_watt", "usd_por_watt", Transform::Cents),
    map("environment.co2_tonnes", "toneladas_co2", Transform::Cents),
    map("environment.trees", "arboles", Transform::Round),
    map("environment.oil_barrels", "barriles_petroleo", Transform::Cents),
    map("bill_before", "pago_actual", Transform::Cents),
    map("bill_after", "pago_con_solar", Transform::Cents),
    map("annual_savings", "ahorro_anual", Transform::Round),
    map("payback_years", "retorno_anios", Transform::Cents),
];

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |v, key| v.get(key))
        .filter(|v| !v.is_null())
}

fn apply_map(out: &mut Map<String, Value>, root: &Value, table: &[FieldMapping], suffix: &str) {
    for m in table {
        if let Some(value) = lookup(root, m.source) {
            out.insert(format!("{}{suffix}", m.target), m.transform.apply(value));
        }
    }
}

/// Flattens a proposal into CRM fields.
///
/// Fields whose source is absent or null are omitted.
///
/// # Errors
///
/// Returns a `serde_json::Error` if the proposal cannot be serialized.
pub fn to_record(proposal: &Proposal) -> serde_json::Result<Map<String, Value>> {
    let root = serde_json::to_value(proposal)?;
    let mut out = Map::new();
    apply_map(&mut out, &root, FIELD_MAP, "");
    if let Some(current) = root.get("current") {
        apply_map(&mut out, current, SCENARIO_MAP, "");
    }
    if let Some(extra) = root.get("with_extra") {
        apply_map(&mut out, extra, SCENARIO_MAP, "_extra");
    }
    Ok(out)
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Exports a record to a CSV file at the given path.
///
/// # Arguments
///
/// * `record` - Flat CRM record from [`to_record`]
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_record_csv(record: &Map<String, Value>, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_record_csv(record, buf)
}

/// Writes a record as `field,value` rows to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_record_csv(record: &Map<String, Value>, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(["field", "value"])?;
    for (field, value) in record {
        wtr.write_record([field.as_str(), cell(value).as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transforms() {
        assert_eq!(Transform::Round.apply(&json!(1234.6)), json!(1235));
        assert_eq!(Transform::Cents.apply(&json!(0.6427)), json!(0.64));
        assert_eq!(Transform::Kilo.apply(&json!(3300.0)), json!(3.3));
        assert_eq!(Transform::Round.apply(&json!("micro")), json!("micro"));
    }

    #[test]
    fn lookup_walks_dotted_paths() {
        let root = json!({"a": {"b": {"c": 3}}, "n": null});
        assert_eq!(lookup(&root, "a.b.c"), Some(&json!(3)));
        assert_eq!(lookup(&root, "a.x"), None);
        assert_eq!(lookup(&root, "n"), None);
    }

    #[test]
    fn suffix_applies_to_extra_scenario() {
        let root = json!({"total": 10.4});
        let table = [map("total", "total", Transform::Round)];
        let mut out = Map::new();
        apply_map(&mut out, &root, &table, "_extra");
        assert_eq!(out.get("total_extra"), Some(&json!(10)));
    }

    #[test]
    fn target_keys_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for m in FIELD_MAP.iter().chain(SCENARIO_MAP) {
            assert!(seen.insert(m.target), "duplicate target {}", m.target);
        }
    }

    #[test]
    fn csv_has_field_value_rows() {
        let mut record = Map::new();
        record.insert("tarifa".into(), json!("1"));
        record.insert("total".into(), json!(125000));
        let mut buf = Vec::new();
        write_record_csv(&record, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "field,value\ntarifa,1\ntotal,125000\n");
    }
}
