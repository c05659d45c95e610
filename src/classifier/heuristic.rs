use crate::classifier::{ClassifiedPage, PageClassifier, Signal};
use crate::crawler::PageRecord;
use crate::html::{element_text, raw_text, visible_text};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Vocabulary that marks API documentation, English and Chinese
pub const API_DOC_INDICATORS: &[&str] = &[
    "endpoint",
    "api reference",
    "api documentation",
    "rest api",
    "http request",
    "http response",
    "parameters",
    "response body",
    "request body",
    "authentication",
    "authorization",
    "接口文档",
    "api文档",
    "接口说明",
    "接口定义",
    "请求参数",
    "响应参数",
    "返回参数",
    "认证方式",
    "调用方法",
    "http请求",
    "http响应",
];

const EXAMPLE_WORDING: &[&str] = &[
    "example request",
    "example response",
    "request example",
    "response example",
    "sample request",
    "sample response",
    "请求示例",
    "返回示例",
    "响应示例",
    "返回结果",
];

const NAME_HEADERS: &[&str] = &["parameter", "param", "name", "field", "参数", "名称", "字段"];

const DETAIL_HEADERS: &[&str] = &[
    "type", "required", "description", "类型", "必选", "必填", "是否必须", "说明", "描述",
];

/// Weighted-signal classifier
///
/// Each signal found on a page adds its weight; the sum is clamped to 1.0.
/// A page is API documentation when the score reaches the confidence floor.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    floor: f64,
}

impl HeuristicClassifier {
    pub fn new(floor: f64) -> Self {
        Self {
            floor: floor.clamp(0.0, 1.0),
        }
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn weight(signal: Signal) -> f64 {
        match signal {
            Signal::MethodPath => 0.40,
            Signal::CurlCommand => 0.20,
            Signal::CodeBlock => 0.05,
            Signal::ParameterTable => 0.20,
            Signal::ExampleWording => 0.10,
            Signal::JsonExample => 0.10,
            Signal::ApiVocabulary => 0.15,
        }
    }

    /// Collects the signals present in an HTML document
    pub fn detect_signals(html: &str) -> Vec<Signal> {
        let document = Html::parse_document(html);
        let text = visible_text(&document);
        let lower = text.to_lowercase();
        let mut signals = Vec::new();

        if method_path_regex().is_match(&text) {
            signals.push(Signal::MethodPath);
        }

        let code_blocks = code_blocks(&document);
        if code_blocks.iter().any(|code| code.contains("curl ")) {
            signals.push(Signal::CurlCommand);
        }
        if !code_blocks.is_empty() {
            signals.push(Signal::CodeBlock);
        }

        if has_parameter_table(&document) {
            signals.push(Signal::ParameterTable);
        }

        if EXAMPLE_WORDING.iter().any(|w| lower.contains(w)) {
            signals.push(Signal::ExampleWording);
        }

        if code_blocks.iter().any(|code| is_json_example(code)) {
            signals.push(Signal::JsonExample);
        }

        let headings = heading_text(&document).to_lowercase();
        if API_DOC_INDICATORS.iter().any(|w| headings.contains(w)) {
            signals.push(Signal::ApiVocabulary);
        }

        signals
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new(0.4)
    }
}

impl PageClassifier for HeuristicClassifier {
    fn classify(&self, page: &Arc<PageRecord>) -> ClassifiedPage {
        let signals = Self::detect_signals(&page.raw_content);
        let confidence = signals
            .iter()
            .map(|s| Self::weight(*s))
            .sum::<f64>()
            .min(1.0);

        trace!(
            "Classified {}: confidence {:.2}, signals {:?}",
            page.url,
            confidence,
            signals
        );

        ClassifiedPage {
            page: Arc::clone(page),
            is_api_doc: confidence >= self.floor,
            confidence,
            signals,
        }
    }
}

fn method_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\s+(/|https?://)\S*")
            .expect("method/path pattern is valid")
    })
}

fn code_blocks(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("pre, code") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| raw_text(&el))
        .filter(|text| !text.trim().is_empty())
        .collect()
}

fn is_json_example(code: &str) -> bool {
    let trimmed = code.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed)
            .map(|v| v.is_object() || v.is_array())
            .unwrap_or(false)
}

fn has_parameter_table(document: &Html) -> bool {
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return false;
    };

    document.select(&table_sel).any(|table| {
        let Some(header_row) = table.select(&row_sel).next() else {
            return false;
        };
        let headers: Vec<String> = header_row
            .select(&cell_sel)
            .map(|cell| element_text(&cell).to_lowercase())
            .collect();
        let names = headers
            .iter()
            .any(|h| NAME_HEADERS.iter().any(|n| h.contains(n)));
        let details = headers
            .iter()
            .any(|h| DETAIL_HEADERS.iter().any(|d| h.contains(d)));
        names && details
    })
}

fn heading_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title, h1, h2, h3") else {
        return String::new();
    };
    document
        .select(&selector)
        .map(|el| element_text(&el))
        .collect::<Vec<_>>()
        .join("\n")
}
