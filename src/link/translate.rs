/*!
 * Translation of client-side job descriptions into service job requests
 */

use dp2_core_interface::{Item, JobRequest, Priority, Script, WireInput, WireOption};
use std::collections::HashMap;
use url::Url;

use crate::error::{LinkError, Result};

/// Job as described on the client side
///
/// Slot names are keys of unordered maps; the order of values inside a slot
/// is significant and preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobDescription {
    /// Script identifier
    pub script: String,
    pub nicename: String,
    pub priority: Option<Priority>,
    pub inputs: HashMap<String, Vec<Url>>,
    pub options: HashMap<String, Vec<String>>,
}

impl JobDescription {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn with_nicename(mut self, nicename: impl Into<String>) -> Self {
        self.nicename = nicename.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Append locators to an input slot
    pub fn with_input(mut self, name: impl Into<String>, urls: impl IntoIterator<Item = Url>) -> Self {
        self.inputs.entry(name.into()).or_default().extend(urls);
        self
    }

    /// Append values to an option slot
    pub fn with_option<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }
}

/// Build the wire request for `description` against the descriptor of its script
///
/// Slots are emitted sorted by name. Every input slot becomes an item list;
/// an option with one value becomes a scalar, with several an item list, and
/// with none it is left out.
///
/// # Errors
///
/// `LinkError::Validation` when the description names a slot `script` does
/// not declare.
pub fn translate(description: &JobDescription, script: &Script) -> Result<JobRequest> {
    let mut input_names: Vec<&String> = description.inputs.keys().collect();
    input_names.sort();

    let mut inputs = Vec::with_capacity(input_names.len());
    for name in input_names {
        if script.input(name).is_none() {
            return Err(LinkError::Validation(format!(
                "script '{}' declares no input '{}'",
                script.id, name
            )));
        }
        let items = description.inputs[name]
            .iter()
            .map(|url| Item::new(url.as_str()))
            .collect();
        inputs.push(WireInput {
            name: name.clone(),
            items,
        });
    }

    let mut option_names: Vec<&String> = description.options.keys().collect();
    option_names.sort();

    let mut options = Vec::with_capacity(option_names.len());
    for name in option_names {
        if script.option(name).is_none() {
            return Err(LinkError::Validation(format!(
                "script '{}' declares no option '{}'",
                script.id, name
            )));
        }
        match description.options[name].as_slice() {
            [] => continue,
            [single] => options.push(WireOption::scalar(name.as_str(), single.as_str())),
            values => options.push(WireOption::items(name.as_str(), values.iter().map(String::as_str))),
        }
    }

    Ok(JobRequest {
        script: script.reference(),
        nicename: description.nicename.clone(),
        priority: description.priority,
        inputs,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp2_core_interface::{OptionValue, Slot};

    fn script() -> Script {
        Script {
            id: "dtbook-to-zedai".to_string(),
            href: "http://localhost:8181/ws/scripts/dtbook-to-zedai".to_string(),
            nicename: "DTBook to ZedAI".to_string(),
            description: String::new(),
            homepage: String::new(),
            inputs: vec![Slot::sequence("source"), Slot::single("metadata")],
            options: vec![
                Slot::single("lang"),
                Slot::sequence("stylesheets"),
                Slot::single("strict"),
            ],
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_two_locators_and_one_value() {
        let description = JobDescription::new("dtbook-to-zedai")
            .with_nicename("my job")
            .with_input(
                "source",
                [url("file:///tmp/book.xml"), url("file:///tmp/extra.xml")],
            )
            .with_option("lang", ["en"]);

        let request = translate(&description, &script()).unwrap();

        assert_eq!(request.script.href, script().href);
        assert_eq!(request.nicename, "my job");
        assert_eq!(request.inputs.len(), 1);
        assert_eq!(request.inputs[0].name, "source");
        assert_eq!(
            request.inputs[0].items,
            vec![
                Item::new("file:///tmp/book.xml"),
                Item::new("file:///tmp/extra.xml")
            ]
        );
        assert_eq!(request.options.len(), 1);
        assert_eq!(request.options[0].scalar_value(), Some("en"));
        assert!(request.options[0].item_list().is_empty());
    }

    #[test]
    fn test_option_cardinality_follows_value_count() {
        let description = JobDescription::new("dtbook-to-zedai")
            .with_option("stylesheets", ["a.xsl", "b.xsl", "c.xsl"])
            .with_option("lang", ["en"])
            .with_option("strict", Vec::<String>::new());

        let request = translate(&description, &script()).unwrap();

        let names: Vec<_> = request.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["lang", "stylesheets"]);

        assert_eq!(request.options[0].value, OptionValue::Scalar("en".to_string()));
        assert_eq!(request.options[1].scalar_value(), None);
        let values: Vec<_> = request.options[1]
            .item_list()
            .iter()
            .map(|i| i.value.as_str())
            .collect();
        assert_eq!(values, vec!["a.xsl", "b.xsl", "c.xsl"]);
    }

    #[test]
    fn test_translation_is_deterministic() {
        let description = JobDescription::new("dtbook-to-zedai")
            .with_input("source", [url("http://example.org/a.xml")])
            .with_input("metadata", [url("http://example.org/meta.xml")])
            .with_option("strict", ["true"])
            .with_option("lang", ["en"])
            .with_option("stylesheets", ["x.xsl", "y.xsl"]);

        let first = serde_json::to_string(&translate(&description, &script()).unwrap()).unwrap();
        let second = serde_json::to_string(&translate(&description.clone(), &script()).unwrap())
            .unwrap();
        assert_eq!(first, second);

        let request = translate(&description, &script()).unwrap();
        let inputs: Vec<_> = request.inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(inputs, vec!["metadata", "source"]);
        let options: Vec<_> = request.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(options, vec!["lang", "strict", "stylesheets"]);
    }

    #[test]
    fn test_undeclared_slots_are_rejected() {
        let unknown_input =
            JobDescription::new("dtbook-to-zedai").with_input("cover", [url("file:///c.png")]);
        assert!(matches!(
            translate(&unknown_input, &script()),
            Err(LinkError::Validation(_))
        ));

        // Input names are not valid option names
        let misplaced = JobDescription::new("dtbook-to-zedai").with_option("source", ["x"]);
        assert!(matches!(
            translate(&misplaced, &script()),
            Err(LinkError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_input_slot_is_kept() {
        let description =
            JobDescription::new("dtbook-to-zedai").with_input("source", Vec::<Url>::new());
        let request = translate(&description, &script()).unwrap();
        assert_eq!(request.inputs.len(), 1);
        assert!(request.inputs[0].items.is_empty());
    }

    #[test]
    fn test_script_reference_uses_id_without_href() {
        let mut script = script();
        script.href.clear();
        let request = translate(&JobDescription::new("dtbook-to-zedai"), &script).unwrap();
        assert_eq!(request.script.href, "dtbook-to-zedai");
        assert_eq!(request.priority, None);
    }
}
