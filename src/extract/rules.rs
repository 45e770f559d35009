//! Per-field resolver chains
//!
//! Each field owns an ordered list of rules. Rules are plain data compiled once
//! from the tables below; the first rule yielding a non-empty value wins.

use super::markup::{block_text, table_row_value};
use super::{DocumentFormat, DocumentView};
use crate::error::{Error, Result};
use regex::Regex;
use scraper::Selector;
use std::fmt;

/// Fields resolved through rule chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Ecli,
    Processo,
    Data,
    Relator,
    Descritores,
    Sumario,
    TextoIntegral,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Ecli,
        Field::Processo,
        Field::Data,
        Field::Relator,
        Field::Descritores,
        Field::Sumario,
        Field::TextoIntegral,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Ecli => "ecli",
            Field::Processo => "processo",
            Field::Data => "data",
            Field::Relator => "relator",
            Field::Descritores => "descritores",
            Field::Sumario => "sumario",
            Field::TextoIntegral => "textoIntegral",
        };
        f.write_str(name)
    }
}

/// Ranked structural selectors for the portal layout and common re-hosts
const SELECTORS: &[(Field, &[&str])] = &[
    (
        Field::Ecli,
        &["meta[name='ecli']", "meta[name='ECLI']", "#ecli", ".ecli", "[class*='ecli']"],
    ),
    (
        Field::Processo,
        &["#processo", ".processo", "[class*='processo']", "[id*='processo']"],
    ),
    (Field::Data, &["#data-acordao", ".data-acordao", ".data", "#data"]),
    (Field::Relator, &["#relator", ".relator", "[class*='relator']"]),
    (Field::Descritores, &["#descritores", ".descritores", "[class*='descritor']"]),
    (Field::Sumario, &["#sumario", ".sumario", "[class*='sumario']"]),
    (
        Field::TextoIntegral,
        &["#texto-integral", ".texto-integral", ".textointegral", "[class*='integral']"],
    ),
];

/// Labels of the portal's two-column metadata table (lowercase, no colon)
const TABLE_LABELS: &[(Field, &[&str])] = &[
    (Field::Ecli, &["ecli"]),
    (Field::Processo, &["processo"]),
    (
        Field::Data,
        &["data do acordão", "data do acórdão", "data da decisão", "data"],
    ),
    (Field::Relator, &["relator", "relatora"]),
    (Field::Descritores, &["descritores"]),
    (Field::Sumario, &["sumário", "sumario"]),
    (
        Field::TextoIntegral,
        &["decisão texto integral", "texto integral"],
    ),
];

/// Labeled-line expressions; capture group 1 holds the value
const LABEL_PATTERNS: &[(Field, &[&str])] = &[
    (
        Field::Ecli,
        &[r"\b(ECLI:[A-Z]{2}:[A-Z0-9]+:\d{4}:[A-Za-z0-9.:]+)"],
    ),
    (
        Field::Processo,
        &[
            r"(?im)^[ \t]*Processo[ \t]*(?:n\.?[ \t]*[º°o]\.?)?[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            r"(?im)^[ \t]*Proc\.?[ \t]*(?:n\.?[ \t]*[º°o]\.?)?[ \t]*:?[ \t]*(\d[^ \t\n]*)[ \t]*$",
        ],
    ),
    (
        Field::Data,
        &[
            r"(?im)^[ \t]*Data[ \t]+do[ \t]+Ac[óo]rd[ãa]o[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            r"(?im)^[ \t]*Data[ \t]+da[ \t]+Decis[ãa]o[ \t]*:[ \t]*(\S.*?)[ \t]*$",
            r"(?im)^[ \t]*Data[ \t]*:[ \t]*(\S.*?)[ \t]*$",
        ],
    ),
    (
        Field::Relator,
        &[r"(?im)^[ \t]*Relatora?[ \t]*:[ \t]*(\S.*?)[ \t]*$"],
    ),
    (
        Field::Descritores,
        &[r"(?im)^[ \t]*Descritores[ \t]*:[ \t]*(\S.*?)[ \t]*$"],
    ),
    (
        Field::Sumario,
        &[
            r"(?ims)^[ \t]*Sum[áa]rio[ \t]*:?[ \t]*\n?(.*?)(?:^[ \t]*(?:Decis[ãa]o[ \t]+Texto[ \t]+Integral|Texto[ \t]+Integral|Decis[ãa]o)[ \t]*:|\z)",
        ],
    ),
    (
        Field::TextoIntegral,
        &[r"(?ims)^[ \t]*(?:Decis[ãa]o[ \t]+)?Texto[ \t]+Integral[ \t]*:[ \t]*(.+)\z"],
    ),
];

/// ECLI-like token inside a locator, with any separator encoding
const LOCATOR_ECLI_PATTERN: &str = r"(?i)ECLI(?:%3A|[:_])[A-Z]{2}(?:(?:%3A|[:_])[A-Z0-9.]+)+";

/// One way of resolving a field
#[derive(Debug)]
pub enum FieldRule {
    /// First element matching a structural selector (markup only)
    Selector { css: String, selector: Selector },

    /// Labeled row of a metadata table (markup only)
    TableLabel(String),

    /// Labeled line in the document text, anchored to line boundaries
    Label(Regex),

    /// ECLI token encoded in the source locator
    LocatorEcli(Regex),
}

impl FieldRule {
    fn applies_to(&self, format: DocumentFormat) -> bool {
        match self {
            FieldRule::Selector { .. } | FieldRule::TableLabel(_) => {
                format == DocumentFormat::Markup
            }
            FieldRule::Label(_) | FieldRule::LocatorEcli(_) => true,
        }
    }

    /// Attempt this rule against a document
    pub fn resolve(&self, view: &DocumentView) -> Option<String> {
        if !self.applies_to(view.format) {
            return None;
        }

        let value = match self {
            FieldRule::Selector { selector, .. } => {
                let element = view.html.as_ref()?.select(selector).next()?;
                if element.value().name() == "meta" {
                    element.value().attr("content").map(str::to_string)
                } else {
                    Some(block_text(element))
                }
            }
            FieldRule::TableLabel(label) => table_row_value(view.html.as_ref()?, label),
            FieldRule::Label(pattern) => pattern
                .captures(&view.text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            FieldRule::LocatorEcli(pattern) => pattern
                .find(&view.locator)
                .map(|m| decode_locator_ecli(m.as_str())),
        }?;

        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

impl fmt::Display for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRule::Selector { css, .. } => write!(f, "selector {}", css),
            FieldRule::TableLabel(label) => write!(f, "table label '{}'", label),
            FieldRule::Label(pattern) => write!(f, "label /{}/", pattern.as_str()),
            FieldRule::LocatorEcli(_) => write!(f, "locator ecli"),
        }
    }
}

/// Turn `ECLI_PT_STJ_2022_167_15` or `ECLI%3APT%3A...` into `ECLI:PT:STJ:...`
pub fn decode_locator_ecli(token: &str) -> String {
    token
        .replace("%3A", ":")
        .replace("%3a", ":")
        .replace('_', ":")
        .to_uppercase()
}

/// Ordered rule chains for every field
#[derive(Debug)]
pub struct RuleSet {
    chains: Vec<(Field, Vec<FieldRule>)>,
}

impl RuleSet {
    /// Build the chains for the jurisprudence portal layout
    pub fn portal_defaults() -> Result<Self> {
        let mut chains = Vec::with_capacity(Field::ALL.len());

        for field in Field::ALL {
            let mut rules = Vec::new();

            for css in table_for(SELECTORS, field) {
                let selector = Selector::parse(css)
                    .map_err(|e| Error::Config(format!("Invalid selector '{}': {:?}", css, e)))?;
                rules.push(FieldRule::Selector {
                    css: css.to_string(),
                    selector,
                });
            }

            for label in table_for(TABLE_LABELS, field) {
                rules.push(FieldRule::TableLabel(label.to_string()));
            }

            for pattern in table_for(LABEL_PATTERNS, field) {
                rules.push(FieldRule::Label(Regex::new(pattern)?));
            }

            if field == Field::Ecli {
                rules.push(FieldRule::LocatorEcli(Regex::new(LOCATOR_ECLI_PATTERN)?));
            }

            chains.push((field, rules));
        }

        Ok(Self { chains })
    }

    /// Rules for a field, in priority order
    pub fn rules(&self, field: Field) -> &[FieldRule] {
        self.chains
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve a field with its chain, `None` when every rule misses
    pub fn resolve(&self, field: Field, view: &DocumentView) -> Option<String> {
        self.resolve_with_rule(field, view).map(|(value, _)| value)
    }

    /// Like [`RuleSet::resolve`], also returning the rule that matched
    pub fn resolve_with_rule(
        &self,
        field: Field,
        view: &DocumentView,
    ) -> Option<(String, &FieldRule)> {
        self.rules(field).iter().find_map(|rule| {
            let value = rule.resolve(view)?;
            tracing::trace!(%field, %rule, "Field resolved");
            Some((value, rule))
        })
    }
}

fn table_for(
    table: &'static [(Field, &'static [&'static str])],
    field: Field,
) -> &'static [&'static str] {
    table
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, entries)| *entries)
        .unwrap_or(&[])
}
