//! HTML rendering of a [`DashboardView`]

use serde_json::{Map, Value};

use super::{DashboardView, NOT_GENERATED_MESSAGE, Panels, ViewState};
use crate::models::income::IncomeExtreme;
use crate::models::results::ProfileIndex;

const VEGA_SCRIPTS: [&str; 3] = [
    "https://cdn.jsdelivr.net/npm/vega@5",
    "https://cdn.jsdelivr.net/npm/vega-lite@5",
    "https://cdn.jsdelivr.net/npm/vega-embed@6",
];

const STYLE: &str = "body{margin:0;font-family:sans-serif;display:flex}\
aside{width:280px;min-height:100vh;padding:1em;background:#f0f2f6;box-sizing:border-box}\
aside label{display:block;margin-top:1em;font-weight:bold}\
aside select,aside input{width:100%}\
main{flex:1;padding:1em 2em}\
.row{display:flex;gap:2em;flex-wrap:wrap}\
.empty{padding:2em;border:1px dashed #999;color:#555}\
.caption{font-size:0.8em;color:#555}";

/// Render a self-contained page. Charts are embedded with vega-embed.
#[must_use]
pub fn render_page(view: &DashboardView) -> String {
    let mut specs = Map::new();
    let mut html = String::with_capacity(16 * 1024);

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>Trends in American Income Segregation</title>\n");
    for src in VEGA_SCRIPTS {
        html.push_str(&format!("<script src=\"{src}\"></script>\n"));
    }
    html.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));

    html.push_str(&sidebar(view));

    html.push_str("<main>\n<h1>Exploring Recent Trends in American Income Segregation</h1>\n");
    html.push_str(&format!("<h2>{}</h2>\n", escape(&view.title)));
    html.push_str(&format!(
        "<h3>Median Household Income (ACS 5-Year {})</h3>\n",
        view.year
    ));
    match &view.map {
        Some(map) => html.push_str(&chart("map", map, &mut specs)),
        None => html.push_str("<p class=\"caption\">No tract map is available for this year.</p>\n"),
    }

    match &view.state {
        ViewState::NotGenerated => html.push_str(&format!(
            "<div class=\"empty\" id=\"not-generated\"><p>Segregation {NOT_GENERATED_MESSAGE}.</p>\
             <p class=\"caption\">Run <code>incseg build --metro {}</code> to compute it.</p></div>\n",
            escape(&view.metro)
        )),
        ViewState::Ready(panels) => html.push_str(&sections(view, panels, &mut specs)),
    }
    html.push_str("</main>\n");

    html.push_str(&format!(
        "<script>\nconst specs = {};\nfor (const [id, spec] of Object.entries(specs)) {{\n  \
         vegaEmbed('#' + id, spec, {{actions: false}});\n}}\n</script>\n</body>\n</html>\n",
        embed_json(&Value::Object(specs))
    ));
    html
}

fn sidebar(view: &DashboardView) -> String {
    let mut form = String::from("<aside>\n<form method=\"get\" action=\"/\">\n");
    form.push_str("<h2>Select a Metropolitan Region</h2>\n<label for=\"metro\">Metro Region</label>\n");
    form.push_str("<select id=\"metro\" name=\"metro\" onchange=\"this.form.submit()\">\n");
    for (code, title) in &view.metros {
        form.push_str(&option(code, title, *code == view.metro));
    }
    form.push_str("</select>\n");

    form.push_str("<label for=\"group\">Income Group</label>\n");
    form.push_str("<select id=\"group\" name=\"group\" onchange=\"this.form.submit()\">\n");
    for group in IncomeExtreme::ALL {
        form.push_str(&option(group.label(), group.label(), group == view.group));
    }
    form.push_str("</select>\n<ul class=\"caption\">\n");
    for group in IncomeExtreme::ALL {
        form.push_str(&format!("<li>{}</li>\n", escape(group.description())));
    }
    form.push_str("</ul>\n");

    let first = view.years.first().copied().unwrap_or(view.year);
    let last = view.years.last().copied().unwrap_or(view.year);
    form.push_str(&format!(
        "<label for=\"year\">Map Year: {year}</label>\n<input type=\"range\" id=\"year\" name=\"year\" \
         min=\"{first}\" max=\"{last}\" step=\"1\" value=\"{year}\" onchange=\"this.form.submit()\">\n",
        year = view.year
    ));

    if let ViewState::Ready(panels) = &view.state {
        form.push_str(&selector(
            "multi_index",
            "Multigroup Index",
            &panels.multi_indices,
            &panels.multi_index,
        ));
        form.push_str(&selector(
            "single_index",
            "Singlegroup Index",
            &panels.single_indices,
            &panels.single_index,
        ));
    }

    form.push_str("<label for=\"profile\">Multiscalar Profile</label>\n");
    form.push_str("<select id=\"profile\" name=\"profile\" onchange=\"this.form.submit()\">\n");
    for profile in ProfileIndex::ALL {
        form.push_str(&option(profile.label(), profile.label(), profile == view.profile));
    }
    form.push_str("</select>\n<noscript><button type=\"submit\">Update</button></noscript>\n");
    form.push_str(
        "<p class=\"caption\">Each index is calculated with block group data from 5-year ACS samples. \
         Each dataset is named for the terminal year of its sample, so overlapping samples should be \
         read as rolling averages.</p>\n",
    );
    form.push_str("</form>\n</aside>\n");
    form
}

fn sections(view: &DashboardView, panels: &Panels, specs: &mut Map<String, Value>) -> String {
    let mut html = String::new();

    html.push_str("<h2>Trends in Multigroup Measures</h2>\n<div class=\"row\">\n");
    html.push_str(&chart("multi-overview", &panels.multi_overview, specs));
    html.push_str(&format!("<div>\n<p>{}</p>\n", markdown_bold(&panels.multi_text)));
    html.push_str(&chart("multi-trend", &panels.multi_trend, specs));
    html.push_str("</div>\n</div>\n");

    html.push_str("<h2>Trends in Singlegroup Measures</h2>\n");
    html.push_str(&format!(
        "<h4>For {} Income Households</h4>\n<div class=\"row\">\n",
        capitalize(view.group.label())
    ));
    html.push_str(&chart("single-overview", &panels.single_overview, specs));
    html.push_str(&format!("<div>\n<p>{}</p>\n", markdown_bold(&panels.single_text)));
    html.push_str(&chart("single-trend", &panels.single_trend, specs));
    html.push_str("</div>\n</div>\n");

    html.push_str("<h2>Trends by Dimension</h2>\n");
    html.push_str(&format!(
        "<h3>Very {} income segregation:</h3>\n",
        view.group.label()
    ));
    html.push_str(&chart("dimensions", &panels.dimensions, specs));

    html.push_str("<h2>Trends through Time and Space</h2>\n");
    html.push_str(&format!(
        "<h3>High and Low Income Multiscalar {} Profiles</h3>\n",
        capitalize(view.profile.label())
    ));
    html.push_str(&chart("profiles", &panels.profiles, specs));
    html
}

/// Placeholder element for a chart, registering its spec under `id`
fn chart(id: &str, spec: &Value, specs: &mut Map<String, Value>) -> String {
    specs.insert(id.to_string(), spec.clone());
    format!("<div id=\"{id}\"></div>\n")
}

fn selector(name: &str, label: &str, values: &[String], selected: &str) -> String {
    let mut html = format!(
        "<label for=\"{name}\">{label}</label>\n<select id=\"{name}\" name=\"{name}\" onchange=\"this.form.submit()\">\n"
    );
    for value in values {
        html.push_str(&option(value, value, value == selected));
    }
    html.push_str("</select>\n");
    html
}

fn option(value: &str, text: &str, selected: bool) -> String {
    format!(
        "<option value=\"{}\"{}>{}</option>\n",
        escape(value),
        if selected { " selected" } else { "" },
        escape(text)
    )
}

/// Escape text for HTML content and attribute values
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON safe to place inside a script element
fn embed_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Escape `text` and turn `**bold**` spans into `<strong>`
fn markdown_bold(text: &str) -> String {
    let escaped = escape(text);
    let mut out = String::with_capacity(escaped.len() + 16);
    let mut parts = escaped.split("**").peekable();
    let mut open = false;
    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            out.push_str(if open { "</strong>" } else { "<strong>" });
            open = !open;
        }
    }
    if open {
        out.push_str("</strong>");
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(state: ViewState) -> DashboardView {
        DashboardView {
            metros: vec![
                ("31080".into(), "Los Angeles & Long Beach".into()),
                ("41740".into(), "San Diego".into()),
            ],
            metro: "41740".into(),
            title: "San Diego".into(),
            group: IncomeExtreme::Low,
            year: 2015,
            years: (2012..=2018).collect(),
            profile: ProfileIndex::Isolation,
            map: None,
            state,
        }
    }

    #[test]
    fn test_not_generated_page() {
        let html = render_page(&view(ViewState::NotGenerated));
        assert!(html.contains(NOT_GENERATED_MESSAGE));
        assert!(html.contains("Los Angeles &amp; Long Beach"));
        assert!(html.contains("<option value=\"41740\" selected>"));
        assert!(html.contains("<option value=\"low\" selected>"));
        assert!(html.contains("min=\"2012\" max=\"2018\""));
        assert!(!html.contains("multi_index"));
    }

    #[test]
    fn test_ready_page_embeds_specs() {
        let spec = json!({"title": "</script><b>"});
        let panels = Panels {
            multi_indices: vec!["MultiGini".into()],
            multi_index: "MultiGini".into(),
            multi_text: "In San Diego, **the index grew**".into(),
            multi_trend: spec.clone(),
            multi_overview: spec.clone(),
            single_indices: vec!["Dissim".into(), "Gini".into()],
            single_index: "Gini".into(),
            single_text: "text".into(),
            single_trend: spec.clone(),
            single_overview: spec.clone(),
            dimensions: spec.clone(),
            profiles: spec,
        };
        let html = render_page(&view(ViewState::Ready(Box::new(panels))));
        assert!(html.contains("<strong>the index grew</strong>"));
        assert!(html.contains("<option value=\"Gini\" selected>"));
        assert!(html.contains("<div id=\"profiles\"></div>"));
        assert!(!html.contains("\"</script>"));
        assert!(!html.contains(NOT_GENERATED_MESSAGE));
    }

    #[test]
    fn test_markdown_bold() {
        assert_eq!(markdown_bold("a **b** c"), "a <strong>b</strong> c");
        assert_eq!(markdown_bold("**open"), "<strong>open</strong>");
        assert_eq!(markdown_bold("x < y"), "x &lt; y");
    }
}
