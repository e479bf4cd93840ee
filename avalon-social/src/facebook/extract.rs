//! Markup extraction for the groups overview and the profile page.
//!
//! Both pages are tables and divs with no stable classes, so rows are
//! recognised by shape. Anything that does not fit the shape is skipped and
//! logged at `debug`; extraction itself never fails.
//!
//! Group rows look like this on the overview page:
//!
//! ```html
//! <table role="presentation"><tbody><tr>
//!   <td><a href="/groups/123456">Test Group</a></td>
//!   <td><span class="bn">5</span></td>
//! </tr></tbody></table>
//! ```

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::facebook::{Group, PostHandle};

const GROUP_LINK: &str = "/groups/";
const GROUP_CREATE_LINK: &str = "/groups/create/";

static GROUP_TABLE: LazyLock<Selector> = LazyLock::new(|| selector(r#"table[role="presentation"]"#));
static ROW_CELL: LazyLock<Selector> = LazyLock::new(|| selector("tbody > tr > td"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static POST: LazyLock<Selector> = LazyLock::new(|| selector(r#"div[data-ft][role="article"]"#));

fn selector(css: &str) -> Selector {
    match Selector::parse(css) {
        Ok(sel) => sel,
        Err(e) => unreachable!("static selector {css:?} is valid: {e}"),
    }
}

/// Groups listed on the overview page, in document order.
///
/// ```
/// use avalon_social::facebook::extract::extract_groups;
///
/// let html = r#"<table role="presentation"><tbody><tr>
///   <td><a href="/groups/42">Rustaceans</a></td><td><span class="bn">3</span></td>
/// </tr></tbody></table>"#;
/// let groups = extract_groups(html);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].url, "/groups/42");
/// assert_eq!(groups[0].notifications, 3);
/// ```
pub fn extract_groups(html: &str) -> Vec<Group> {
    let document = Html::parse_document(html);
    let mut groups = Vec::new();

    for table in document.select(&GROUP_TABLE) {
        let markup = table.inner_html();
        if !markup.contains(GROUP_LINK) || markup.contains(GROUP_CREATE_LINK) {
            continue;
        }

        let cells: Vec<ElementRef<'_>> = table.select(&ROW_CELL).collect();
        let [link_cell, badge_cell] = cells.as_slice() else {
            tracing::debug!(cells = cells.len(), "groups.skip.shape");
            continue;
        };

        let Some((url, name)) = group_link(*link_cell) else {
            tracing::debug!("groups.skip.no_link");
            continue;
        };
        let Some(notifications) = badge_count(*badge_cell) else {
            tracing::debug!(url = %url, "groups.skip.badge");
            continue;
        };

        groups.push(Group {
            url,
            name,
            notifications,
        });
    }

    groups
}

fn group_link(cell: ElementRef<'_>) -> Option<(String, String)> {
    let anchor = cell.select(&LINK).next()?;
    let url = anchor.value().attr("href")?.trim().to_string();
    let name = anchor.text().collect::<String>().trim().to_string();
    Some((url, name))
}

/// `Some(0)` for an empty cell, `Some(n)` for a numeric badge, `None` when
/// the badge holds anything else.
fn badge_count(cell: ElementRef<'_>) -> Option<u32> {
    if cell.inner_html().trim().is_empty() {
        return Some(0);
    }
    cell.text().collect::<String>().trim().parse().ok()
}

/// Post-like elements on the profile page, in document order.
pub fn extract_posts(html: &str) -> Vec<PostHandle> {
    let document = Html::parse_document(html);
    document
        .select(&POST)
        .filter_map(|div| {
            let element = div.value();
            Some(PostHandle {
                tracking: element.attr("data-ft")?.to_string(),
                id: element.id().map(str::to_string),
                html: div.html(),
            })
        })
        .collect()
}
