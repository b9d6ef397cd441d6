//! Form observer
//!
//! - `form_view` once per form, for forms present at init and forms added
//!   to the DOM later
//! - `form_interaction` on the first field interaction per form
//! - `form_submit` on submit, followed by an identify call when the form
//!   carries an email address
//!
//! Field values never leave the plugin except the identify traits.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use trailmark_core::domain::{EventType, PluginName, Properties};
use trailmark_core::ports::{FormField, FormInfo, PageSignal, SignalKind};

use crate::plugin::{Plugin, PluginContext, Subscriptions, TrackerHandle};
use crate::util::props;

// Field names are compared after lowercasing and dropping `_`, `-`, spaces
const FIRST_NAME_FIELDS: &[&str] = &["firstname", "fname", "givenname"];
const LAST_NAME_FIELDS: &[&str] = &["lastname", "lname", "surname", "familyname"];
const COMPANY_FIELDS: &[&str] = &["company", "companyname", "organization", "organisation"];
const PHONE_FIELDS: &[&str] = &["phone", "tel", "telephone", "mobile", "phonenumber"];

#[derive(Default)]
struct FormsState {
    viewed: HashSet<String>,
    interacted: HashSet<String>,
}

pub struct FormsPlugin {
    state: Arc<Mutex<FormsState>>,
    subscriptions: Option<Subscriptions>,
}

impl FormsPlugin {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FormsState::default())),
            subscriptions: None,
        }
    }
}

impl Default for FormsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &Mutex<FormsState>) -> MutexGuard<'_, FormsState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn form_label(form: &FormInfo) -> String {
    form.name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(&form.id)
        .to_string()
}

fn form_properties(form: &FormInfo) -> Properties {
    let fields: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
    props(json!({
        "form_id": form.id,
        "form_name": form.name,
        "form_action": form.action,
        "field_count": form.fields.len(),
        "fields": fields,
    }))
}

fn field_value(field: &FormField) -> Option<&str> {
    field
        .value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The submitted email address, if the form has a recognizable email field
pub fn extract_email(form: &FormInfo) -> Option<String> {
    form.fields
        .iter()
        .filter(|f| {
            f.field_type.eq_ignore_ascii_case("email") || normalize(&f.name).contains("email")
        })
        .filter_map(field_value)
        .find(|v| v.contains('@'))
        .map(str::to_string)
}

/// Best-effort identify traits inferred from field names
pub fn extract_traits(form: &FormInfo) -> Properties {
    let mut traits = Properties::new();
    let groups: [(&str, &[&str]); 4] = [
        ("firstName", FIRST_NAME_FIELDS),
        ("lastName", LAST_NAME_FIELDS),
        ("company", COMPANY_FIELDS),
        ("phone", PHONE_FIELDS),
    ];

    for field in &form.fields {
        if field.field_type.eq_ignore_ascii_case("password") {
            continue;
        }
        let Some(value) = field_value(field) else {
            continue;
        };
        let name = normalize(&field.name);
        for (key, aliases) in groups {
            if aliases.contains(&name.as_str()) && !traits.contains_key(key) {
                traits.insert(key.to_string(), json!(value));
            }
        }
    }
    traits
}

fn track_view(state: &Mutex<FormsState>, tracker: &dyn TrackerHandle, form: &FormInfo) {
    if !lock(state).viewed.insert(form.id.clone()) {
        return;
    }
    tracker.track(
        EventType::FormView,
        &format!("Form viewed: {}", form_label(form)),
        form_properties(form),
    );
}

impl Plugin for FormsPlugin {
    fn name(&self) -> PluginName {
        PluginName::Forms
    }

    fn init(&mut self, ctx: PluginContext) -> anyhow::Result<()> {
        for form in ctx.page.forms() {
            track_view(&self.state, ctx.tracker.as_ref(), &form);
        }

        let mut subscriptions = Subscriptions::new(Arc::clone(&ctx.events));

        let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
        subscriptions.listen(SignalKind::FormAdded, move |signal| {
            if let PageSignal::FormAdded(form) = signal {
                track_view(&state, tracker.as_ref(), form);
            }
        });

        let (state, tracker) = (Arc::clone(&self.state), Arc::clone(&ctx.tracker));
        subscriptions.listen(SignalKind::FormInteraction, move |signal| {
            let PageSignal::FormInteraction {
                form_id,
                field_name,
            } = signal
            else {
                return;
            };
            if !lock(&state).interacted.insert(form_id.clone()) {
                return;
            }
            tracker.track(
                EventType::FormInteraction,
                &format!("Form started: {}", form_id),
                props(json!({ "form_id": form_id, "field_name": field_name })),
            );
        });

        let tracker = Arc::clone(&ctx.tracker);
        subscriptions.listen(SignalKind::FormSubmit, move |signal| {
            let PageSignal::FormSubmit(form) = signal else {
                return;
            };
            tracker.track(
                EventType::FormSubmit,
                &format!("Form submitted: {}", form_label(form)),
                form_properties(form),
            );
            if let Some(email) = extract_email(form) {
                tracker.identify(&email, extract_traits(form));
            }
        });

        self.subscriptions = Some(subscriptions);
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut subscriptions) = self.subscriptions.take() {
            subscriptions.clear();
        }
    }
}
