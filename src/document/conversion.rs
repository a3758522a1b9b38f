use super::persist::GraphDocument;
use crate::error::DocumentConversionError;

/// A trait for custom graph formats that can be converted into a Kairo `GraphDocument`.
///
/// Implement it on the structs your editor or storage layer already uses, then
/// hand them to [`Document::load_from`](super::Document::load_from).
///
/// # Example
///
/// ```rust,no_run
/// use kairo::prelude::*;
/// use kairo::document::{NodeRecord, Position};
/// use kairo::error::DocumentConversionError;
///
/// struct Sticky { id: String, note: String }
/// struct Board { stickies: Vec<Sticky> }
///
/// impl IntoDocument for Board {
///     fn into_document(self) -> std::result::Result<GraphDocument, DocumentConversionError> {
///         let mut nodes = Vec::new();
///         for sticky in self.stickies {
///             let id: NodeId = sticky.id.parse().map_err(|_| {
///                 DocumentConversionError::ValidationError(format!("bad id '{}'", sticky.id))
///             })?;
///             let mut data = serde_json::Map::new();
///             data.insert("value".to_string(), sticky.note.into());
///             nodes.push(NodeRecord {
///                 id,
///                 type_name: "text".to_string(),
///                 position: Position::default(),
///                 size: None,
///                 data,
///                 inputs: None,
///             });
///         }
///         Ok(GraphDocument { nodes, connections: vec![] })
///     }
/// }
/// ```
pub trait IntoDocument {
    /// Consumes the value and converts it into a graph document.
    fn into_document(self) -> Result<GraphDocument, DocumentConversionError>;
}

impl IntoDocument for GraphDocument {
    fn into_document(self) -> Result<GraphDocument, DocumentConversionError> {
        Ok(self)
    }
}
