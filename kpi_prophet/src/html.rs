//! HTML fragments of the forecast pages

use crate::config::ForecastDefinition;
use std::fmt::Write;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode a single URL path segment
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Query text marked up for the client-side highlighter
pub fn highlight_query(query: &str) -> String {
    format!(
        r#"<pre><code class="language-sql">{}</code></pre>"#,
        escape(query.trim())
    )
}

/// Placeholder filled by `loadContentAsynchronously` once `url` answers
fn asynchronous_content(id: &str, url: &str) -> String {
    format!(
        r#"<div id="{id}" class="async-content"><span class="fa fa-spinner fa-spin"></span></div>
<script>loadContentAsynchronously('{id}', '{url}');</script>"#,
        id = escape(id),
        url = escape(url),
    )
}

fn card(header_left: &str, header_right: &str, body: &str) -> String {
    format!(
        r#"<div class="card">
  <div class="card-header"><div class="card-header-left">{}</div><div class="card-header-right">{}</div></div>
  <div class="card-block">{}</div>
</div>"#,
        header_left, header_right, body
    )
}

/// Page listing every configured forecast
pub fn listing_page(prefix: &str, forecasts: &[ForecastDefinition]) -> String {
    let mut page = String::new();
    writeln!(
        page,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Forecasts</title>
<link rel="stylesheet" href="https://fonts.googleapis.com/css?family=Open+Sans:300,400,700">
<script src="{prefix}/static/forecast.js"></script>
</head>
<body>
<div id="forecast-container">"#
    )
    .ok();

    for (i, forecast) in forecasts.iter().enumerate() {
        let name = escape(&forecast.metric_name);
        let image_name = encode_path_segment(&forecast.normalized_name());
        let details_url = format!(
            "{}/_query_details/{}",
            prefix,
            encode_path_segment(&forecast.metric_name)
        );
        let download_url = format!("{}/_download/{}", prefix, image_name);

        let header_right = format!(
            r#"<a class="query-control" href="{}"><span class="fa fa-download"> </span></a>
<a class="query-control" href="javascript:showQueryDetails('{}')"><span class="fa fa-eye"> </span></a>"#,
            escape(&download_url),
            escape(&details_url)
        );
        let main_body = format!(
            r#"{}<br><br>
<div class="modal fade" id="query-details-dialog" tabindex="-1">
  <div class="modal-dialog modal-lg" role="document">
    <div class="modal-content">
      <div class="modal-header"><h5 class="modal-title">Time-series query</h5>
        <button type="button" class="close" data-dismiss="modal" aria-label="Close"><span aria-hidden="true">&times;</span></button>
      </div>
      <div class="modal-body" id="query-details"></div>
    </div>
  </div>
</div>"#,
            asynchronous_content(
                &format!("forecast-plot-{}", i),
                &format!("{}/_get_plot_image/{}/False", prefix, image_name)
            )
        );
        let components_body = asynchronous_content(
            &format!("forecast-components-{}", i),
            &format!("{}/_get_plot_image/{}/True", prefix, image_name),
        );

        writeln!(
            page,
            r#"<div class="row"><div class="col-xl-12"><div class="section-header">{name}</div></div></div>
<div class="row">
<div class="col-xl-12">
<p>Number of days: {days}<br>Time-series query: {query}</p>
{main}
</div>
<div class="col-xl-12">
{components}
</div>
<hr>
</div>"#,
            name = name,
            days = forecast.number_of_days,
            query = highlight_query(&forecast.time_series_query),
            main = card(&format!("Forecast plot of \"{}\"", name), &header_right, &main_body),
            components = card(
                &format!(
                    "Forecast components (trend, holidays, seasonality) of \"{}\"",
                    name
                ),
                "",
                &components_body
            ),
        )
        .ok();
    }

    writeln!(page, "</div>\n</body>\n</html>").ok();
    page
}

/// Query text and horizon of a forecast; the horizon row is left out when unknown
pub fn query_details_table(query: &str, number_of_days: Option<usize>) -> String {
    let mut table = String::from(r#"<table class="table table-sm"><tbody>"#);
    write!(table, "<tr><td>{}</td></tr>", highlight_query(query)).ok();
    if let Some(days) = number_of_days {
        write!(table, "<tr><td>Number of days forecasted: {}</td></tr>", days).ok();
    }
    table.push_str("</tbody></table>");
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"a < b && c > "d""#), "a &lt; b &amp;&amp; c &gt; &quot;d&quot;");
    }

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("Daily Signups"), "Daily%20Signups");
        assert_eq!(encode_path_segment("a/b"), "a%2Fb");
        assert_eq!(encode_path_segment("signups_7d"), "signups_7d");
    }

    #[test]
    fn test_listing_links_use_normalized_name() {
        let page = listing_page(
            "/forecasts",
            &[ForecastDefinition::new("Daily Signups", 30, "SELECT 1 WHERE 2 > 1")],
        );
        assert!(page.contains("/forecasts/_get_plot_image/daily_signups/False"));
        assert!(page.contains("/forecasts/_get_plot_image/daily_signups/True"));
        assert!(page.contains("/forecasts/_query_details/Daily%20Signups"));
        assert!(page.contains("Number of days: 30"));
        assert!(page.contains("SELECT 1 WHERE 2 &gt; 1"));
    }

    #[test]
    fn test_query_details_without_days() {
        let table = query_details_table("", None);
        assert!(!table.contains("Number of days forecasted"));
    }
}
