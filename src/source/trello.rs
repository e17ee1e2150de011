//! Trello board export payload.
//!
//! Accepts either a single board export (what Trello's "Export as JSON"
//! produces) or `{ "organizations": [...], "boards": [...] }` for a whole
//! account.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrelloExport {
    #[serde(default)]
    pub organizations: Vec<TrelloOrganization>,
    #[serde(default)]
    pub boards: Vec<TrelloBoard>,
}

pub(crate) fn parse_export(bytes: &[u8]) -> serde_json::Result<TrelloExport> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if value.get("boards").is_none() && value.get("id").is_some() {
        let board: TrelloBoard = serde_json::from_value(value)?;
        return Ok(TrelloExport {
            organizations: Vec::new(),
            boards: vec![board],
        });
    }
    serde_json::from_value(value)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloOrganization {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloPrefs {
    #[serde(default)]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloBoard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub id_organization: Option<String>,
    #[serde(default)]
    pub prefs: TrelloPrefs,
    #[serde(default)]
    pub lists: Vec<TrelloList>,
    #[serde(default)]
    pub cards: Vec<TrelloCard>,
    #[serde(default)]
    pub checklists: Vec<TrelloChecklist>,
    #[serde(default)]
    pub actions: Vec<TrelloAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloList {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub pos: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloLabel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloAttachment {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub is_upload: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloCard {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub id_list: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub due_complete: bool,
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub labels: Vec<TrelloLabel>,
    #[serde(default)]
    pub attachments: Vec<TrelloAttachment>,
    #[serde(default)]
    pub id_attachment_cover: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloCheckItem {
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pos: f64,
}

impl TrelloCheckItem {
    pub fn is_complete(&self) -> bool {
        self.state == "complete"
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloChecklist {
    pub id: String,
    pub id_card: String,
    pub name: String,
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub check_items: Vec<TrelloCheckItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrelloCardRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrelloActionData {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub card: Option<TrelloCardRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrelloAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub data: TrelloActionData,
}

impl TrelloAction {
    pub const COMMENT: &'static str = "commentCard";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_board_export_is_wrapped() {
        let export = parse_export(
            br##"{"id": "b1", "name": "Board", "lists": [], "cards": [],
                 "prefs": {"backgroundColor": "#0079BF"}}"##,
        )
        .unwrap();
        assert!(export.organizations.is_empty());
        assert_eq!(export.boards.len(), 1);
        assert_eq!(
            export.boards[0].prefs.background_color.as_deref(),
            Some("#0079BF")
        );
    }

    #[test]
    fn account_export_keeps_organizations() {
        let export = parse_export(
            br#"{"organizations": [{"id": "o1", "displayName": "Acme"}],
                 "boards": [{"id": "b1", "name": "Board", "idOrganization": "o1"}]}"#,
        )
        .unwrap();
        assert_eq!(export.organizations[0].display_name, "Acme");
        assert_eq!(export.boards[0].id_organization.as_deref(), Some("o1"));
    }
}
