use handlebars::{Handlebars, TemplateError};
use std::sync::Arc;

pub type Hbs = Arc<Handlebars<'static>>;

const TEMPLATES: &[(&str, &str)] = &[
    ("layouts/base", include_str!("../../templates/layouts/base.hbs")),
    ("pages/home", include_str!("../../templates/pages/home.hbs")),
    ("pages/not_found", include_str!("../../templates/pages/not_found.hbs")),
    ("pages/login", include_str!("../../templates/pages/login.hbs")),
    ("pages/register", include_str!("../../templates/pages/register.hbs")),
    ("pages/dashboard", include_str!("../../templates/pages/dashboard.hbs")),
    ("pages/coin", include_str!("../../templates/pages/coin.hbs")),
    ("pages/alerts", include_str!("../../templates/pages/alerts.hbs")),
    ("pages/alert_new", include_str!("../../templates/pages/alert_new.hbs")),
    ("pages/profile", include_str!("../../templates/pages/profile.hbs")),
    ("partials/coins_table", include_str!("../../templates/partials/coins_table.hbs")),
    ("partials/search_results", include_str!("../../templates/partials/search_results.hbs")),
    ("partials/alerts_list", include_str!("../../templates/partials/alerts_list.hbs")),
    ("partials/telegram_panel", include_str!("../../templates/partials/telegram_panel.hbs")),
    ("partials/password_form", include_str!("../../templates/partials/password_form.hbs")),
    ("partials/email_form", include_str!("../../templates/partials/email_form.hbs")),
];

/// Templates are compiled into the binary; registration only fails on a syntax error.
pub fn build_handlebars() -> Result<Hbs, TemplateError> {
    let mut hb = Handlebars::new();

    for (name, source) in TEMPLATES {
        hb.register_template_string(name, *source)?;
    }

    hb.register_partial("navbar", include_str!("../../templates/partials/navbar.hbs"))?;
    hb.register_partial("footer", include_str!("../../templates/partials/footer.hbs"))?;
    hb.register_partial(
        "telegram_panel",
        include_str!("../../templates/partials/telegram_panel.hbs"),
    )?;
    hb.register_partial(
        "password_form",
        include_str!("../../templates/partials/password_form.hbs"),
    )?;

    hb.register_partial(
        "email_form",
        include_str!("../../templates/partials/email_form.hbs"),
    )?;

    Ok(Arc::new(hb))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn all_templates_compile_and_render() {
        let hb = build_handlebars().unwrap();
        for (name, _) in TEMPLATES {
            hb.render(name, &json!({})).unwrap();
        }
    }

    #[test]
    fn layout_embeds_body_unescaped() {
        let hb = build_handlebars().unwrap();
        let html = hb
            .render("layouts/base", &json!({ "title": "T", "body": "<p id=\"x\">hi</p>" }))
            .unwrap();
        assert!(html.contains("<p id=\"x\">hi</p>"));
        assert!(html.contains("<title>T · CryptoWatch</title>"));
    }
}
