//! HTML bodies for owner notices, compiled from `templates/`.

use askama::Template;
use sandbox_core::{
  BoxError,
  notify::{Notice, NoticeRenderer},
};

#[derive(Template)]
#[template(path = "notify.html")]
struct ExpiringTemplate<'a> {
  org:        &'a str,
  space:      &'a str,
  purge_date: String,
  days:       i64,
}

#[derive(Template)]
#[template(path = "purge.html")]
struct PurgedTemplate<'a> {
  org:   &'a str,
  space: &'a str,
  days:  i64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl NoticeRenderer for HtmlRenderer {
  fn render(&self, notice: &Notice<'_>) -> Result<String, BoxError> {
    let body = match *notice {
      Notice::Expiring { org, space, purge_date, days } => ExpiringTemplate {
        org: &org.name,
        space: &space.name,
        purge_date: purge_date.format("%Y-%m-%d").to_string(),
        days,
      }
      .render()?,
      Notice::Purged { org, space, days } => PurgedTemplate {
        org: &org.name,
        space: &space.name,
        days,
      }
      .render()?,
    };
    Ok(body)
  }
}
