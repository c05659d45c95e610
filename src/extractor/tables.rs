//! Parameter and field tables
//!
//! Documentation sites describe parameters in tables whose columns vary from
//! site to site. Columns are recognized by their header text.

use crate::html::element_text;
use crate::openapi::{ParameterLocation, Requirement, Schema};
use scraper::{ElementRef, Selector};

/// Header row and body rows of an HTML table, as cell text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One row of a parameter or field table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableField {
    pub name: String,
    pub schema: Schema,
    pub required: Requirement,
    /// Location given by an `In`/`Location` column
    pub location: Option<ParameterLocation>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ColumnMap {
    name: Option<usize>,
    ty: Option<usize>,
    required: Option<usize>,
    location: Option<usize>,
    description: Option<usize>,
}

/// Reads an HTML table into header and row cell text
///
/// The first row is the header row, whether it uses `<th>` or `<td>`.
pub fn parse_table(table: &ElementRef) -> ParsedTable {
    let (Ok(row_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("th, td")) else {
        return ParsedTable::default();
    };

    let mut rows = table.select(&row_sel).map(|row| {
        row.select(&cell_sel)
            .map(|cell| element_text(&cell))
            .collect::<Vec<_>>()
    });

    let headers = rows.next().unwrap_or_default();
    ParsedTable {
        headers,
        rows: rows.filter(|r| r.iter().any(|c| !c.is_empty())).collect(),
    }
}

/// Interprets a table as parameter/field rows
///
/// Returns `None` when the headers do not look like a parameter table: a
/// name column plus at least one of type, required or description.
pub fn table_fields(table: &ParsedTable) -> Option<Vec<TableField>> {
    let columns = detect_columns(&table.headers)?;
    let name_col = columns.name?;

    let fields = table
        .rows
        .iter()
        .filter_map(|row| {
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty() && *c != "-")
            };

            let (name, name_requirement) = parse_name_cell(cell(Some(name_col))?)?;
            let description = cell(columns.description).map(str::to_string);

            let required = match cell(columns.required) {
                Some(text) => parse_requirement(text),
                None => name_requirement
                    .or_else(|| description.as_deref().map(requirement_from_description))
                    .unwrap_or(Requirement::Unknown),
            };

            Some(TableField {
                name,
                schema: cell(columns.ty)
                    .map(Schema::from_type_name)
                    .unwrap_or(Schema::Unknown),
                required,
                location: cell(columns.location).and_then(parse_location),
                description,
            })
        })
        .collect::<Vec<_>>();

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn detect_columns(headers: &[String]) -> Option<ColumnMap> {
    let mut map = ColumnMap::default();

    for (idx, header) in headers.iter().enumerate() {
        let h = header.trim().to_lowercase();
        if map.location.is_none() && (h == "in" || h.contains("location") || h.contains("位置")) {
            map.location = Some(idx);
        } else if map.required.is_none()
            && ["required", "optional", "必选", "必填", "必须", "是否必"]
                .iter()
                .any(|k| h.contains(k))
        {
            map.required = Some(idx);
        } else if map.ty.is_none() && (h.contains("type") || h.contains("类型")) {
            map.ty = Some(idx);
        } else if map.description.is_none()
            && ["description", "desc", "meaning", "说明", "描述", "含义"]
                .iter()
                .any(|k| h.contains(k))
        {
            map.description = Some(idx);
        } else if map.name.is_none()
            && ["name", "param", "field", "key", "property", "参数", "名称", "字段"]
                .iter()
                .any(|k| h.contains(k))
        {
            map.name = Some(idx);
        }
    }

    let has_detail = map.ty.is_some() || map.required.is_some() || map.description.is_some();
    (map.name.is_some() && has_detail).then_some(map)
}

/// Splits requiredness markers off a name cell: `id*`, `id (required)`
fn parse_name_cell(text: &str) -> Option<(String, Option<Requirement>)> {
    let lower = text.to_lowercase();
    let mut requirement = None;
    if text.contains('*') || lower.contains("(required)") {
        requirement = Some(Requirement::Required);
    } else if lower.contains("(optional)") {
        requirement = Some(Requirement::Optional);
    }

    let name = text
        .split(|c: char| c.is_whitespace() || c == '(' || c == '*')
        .find(|s| !s.is_empty())?
        .trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == ':')
        .to_string();

    if name.is_empty() {
        None
    } else {
        Some((name, requirement))
    }
}

/// Interprets a `Required` column cell
pub fn parse_requirement(text: &str) -> Requirement {
    let lower = text.trim().to_lowercase();
    match lower.as_str() {
        "yes" | "y" | "true" | "required" | "必选" | "必填" | "是" | "必须" | "✓" | "✔" => {
            Requirement::Required
        }
        "no" | "n" | "false" | "optional" | "可选" | "否" | "非必填" | "非必须" => {
            Requirement::Optional
        }
        _ => Requirement::Unknown,
    }
}

fn requirement_from_description(description: &str) -> Requirement {
    let lower = description.trim_start_matches(['(', '[']).to_lowercase();
    if lower.starts_with("required") {
        Requirement::Required
    } else if lower.starts_with("optional") {
        Requirement::Optional
    } else {
        Requirement::Unknown
    }
}

/// Interprets an `In`/`Location` cell, or a section label naming a location
pub fn parse_location(text: &str) -> Option<ParameterLocation> {
    let lower = text.to_lowercase();
    if lower.contains("path") || lower.contains("路径") {
        Some(ParameterLocation::Path)
    } else if lower.contains("query") || lower.contains("查询") {
        Some(ParameterLocation::Query)
    } else if lower.contains("header") || lower.contains("请求头") {
        Some(ParameterLocation::Header)
    } else if ["body", "form", "payload", "请求体"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(ParameterLocation::Body)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_table(html: &str) -> ParsedTable {
        let document = Html::parse_document(html);
        let selector = Selector::parse("table").unwrap();
        let table = document.select(&selector).next().unwrap();
        parse_table(&table)
    }

    #[test]
    fn test_english_parameter_table() {
        let table = first_table(
            r#"<table>
            <tr><th>Name</th><th>In</th><th>Type</th><th>Required</th><th>Description</th></tr>
            <tr><td>id</td><td>path</td><td>integer</td><td>yes</td><td>User id</td></tr>
            <tr><td>expand</td><td>query</td><td>string</td><td>no</td><td>Related objects</td></tr>
            </table>"#,
        );
        let fields = table_fields(&table).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "id");
        assert_eq!(fields[0].location, Some(ParameterLocation::Path));
        assert_eq!(fields[0].schema, Schema::Integer);
        assert_eq!(fields[0].required, Requirement::Required);
        assert_eq!(fields[1].required, Requirement::Optional);
        assert_eq!(fields[1].description.as_deref(), Some("Related objects"));
    }

    #[test]
    fn test_chinese_parameter_table() {
        let table = first_table(
            r#"<table>
            <tr><td>参数名</td><td>参数类型</td><td>是否必须</td><td>说明</td></tr>
            <tr><td>item_id</td><td>Number</td><td>是</td><td>商品ID</td></tr>
            <tr><td>fields</td><td>String</td><td>可选</td><td>返回字段</td></tr>
            </table>"#,
        );
        let fields = table_fields(&table).unwrap();
        assert_eq!(fields[0].name, "item_id");
        assert_eq!(fields[0].schema, Schema::Number);
        assert_eq!(fields[0].required, Requirement::Required);
        assert_eq!(fields[1].required, Requirement::Optional);
    }

    #[test]
    fn test_requiredness_unknown_without_evidence() {
        let table = first_table(
            r#"<table><tr><th>Field</th><th>Type</th></tr>
            <tr><td>name</td><td>Widget</td></tr></table>"#,
        );
        let fields = table_fields(&table).unwrap();
        assert_eq!(fields[0].required, Requirement::Unknown);
        assert_eq!(fields[0].schema, Schema::Unknown);
    }

    #[test]
    fn test_name_cell_markers() {
        let table = first_table(
            r#"<table><tr><th>Parameter</th><th>Description</th></tr>
            <tr><td>token*</td><td>Access token</td></tr>
            <tr><td>page (optional)</td><td>Page number</td></tr>
            <tr><td>cursor</td><td>Required. Pagination cursor</td></tr></table>"#,
        );
        let fields = table_fields(&table).unwrap();
        assert_eq!(fields[0].name, "token");
        assert_eq!(fields[0].required, Requirement::Required);
        assert_eq!(fields[1].name, "page");
        assert_eq!(fields[1].required, Requirement::Optional);
        assert_eq!(fields[2].required, Requirement::Required);
    }

    #[test]
    fn test_non_parameter_table_rejected() {
        let table = first_table(
            r#"<table><tr><th>Plan</th><th>Price</th></tr>
            <tr><td>Pro</td><td>$10</td></tr></table>"#,
        );
        assert!(table_fields(&table).is_none());
    }

    #[test]
    fn test_parse_location_labels() {
        assert_eq!(parse_location("Query parameters"), Some(ParameterLocation::Query));
        assert_eq!(parse_location("Request body"), Some(ParameterLocation::Body));
        assert_eq!(parse_location("Headers"), Some(ParameterLocation::Header));
        assert_eq!(parse_location("Parameters"), None);
    }
}
