//! Typed tool commands. The dialogue layer hands over a tool name and its
//! JSON arguments; everything past [`ToolCommand::parse`] is typed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const ADD_TO_CART: &str = "add_to_cart";
pub const GET_MENU_INFO: &str = "get_menu_info";
pub const FINALIZE_ORDER: &str = "finalize_order";

pub const TOOL_NAMES: [&str; 3] = [ADD_TO_CART, GET_MENU_INFO, FINALIZE_ORDER];

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {source}")]
    InvalidArguments {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddToCartRequest {
    pub item_name: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub addons: Option<Vec<String>>,
}

impl AddToCartRequest {
    /// Missing or non-positive quantities count as one.
    pub fn quantity(&self) -> u32 {
        match self.quantity {
            Some(quantity) if quantity > 0 => u32::try_from(quantity).unwrap_or(u32::MAX),
            _ => 1,
        }
    }

    pub fn add_ons(&self) -> &[String] {
        self.addons.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MenuInfoRequest {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolCommand {
    AddToCart(AddToCartRequest),
    GetMenuInfo(MenuInfoRequest),
    FinalizeOrder,
}

impl ToolCommand {
    pub fn parse(name: &str, arguments: Value) -> Result<Self, ToolError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        match name {
            ADD_TO_CART => decode(ADD_TO_CART, arguments).map(Self::AddToCart),
            GET_MENU_INFO => decode(GET_MENU_INFO, arguments).map(Self::GetMenuInfo),
            FINALIZE_ORDER => Ok(Self::FinalizeOrder),
            other => Err(ToolError::UnknownTool(other.to_owned())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddToCart(_) => ADD_TO_CART,
            Self::GetMenuInfo(_) => GET_MENU_INFO,
            Self::FinalizeOrder => FINALIZE_ORDER,
        }
    }
}

fn decode<T: DeserializeOwned>(tool: &'static str, arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|source| ToolError::InvalidArguments { tool, source })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReply {
    pub message: String,
}

impl ToolReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AddToCartRequest, MenuInfoRequest, ToolCommand, ToolError, TOOL_NAMES};

    #[test]
    fn add_to_cart_parses_with_optional_fields() {
        let command = ToolCommand::parse(
            "add_to_cart",
            json!({"item_name": "crescant", "quantity": 2, "addons": ["avocado"]}),
        )
        .expect("valid arguments");

        let ToolCommand::AddToCart(request) = command else {
            panic!("expected add_to_cart, got {command:?}");
        };
        assert_eq!(request.item_name, "crescant");
        assert_eq!(request.quantity(), 2);
        assert_eq!(request.add_ons(), ["avocado".to_owned()]);
    }

    #[test]
    fn missing_or_non_positive_quantity_defaults_to_one() {
        let request = |quantity| AddToCartRequest {
            item_name: "soup".to_owned(),
            quantity,
            addons: None,
        };

        assert_eq!(request(None).quantity(), 1);
        assert_eq!(request(Some(0)).quantity(), 1);
        assert_eq!(request(Some(-3)).quantity(), 1);
        assert_eq!(request(Some(4)).quantity(), 4);
        assert!(request(None).add_ons().is_empty());
    }

    #[test]
    fn menu_info_and_finalize_accept_null_arguments() {
        assert_eq!(
            ToolCommand::parse("get_menu_info", serde_json::Value::Null).expect("parse"),
            ToolCommand::GetMenuInfo(MenuInfoRequest::default())
        );
        assert_eq!(
            ToolCommand::parse("finalize_order", json!({})).expect("parse"),
            ToolCommand::FinalizeOrder
        );
    }

    #[test]
    fn malformed_arguments_name_the_tool() {
        let error = ToolCommand::parse("add_to_cart", json!({"quantity": 1}))
            .expect_err("item_name is required");
        assert!(matches!(error, ToolError::InvalidArguments { tool: "add_to_cart", .. }));
    }

    #[test]
    fn unknown_tools_are_rejected() {
        let error = ToolCommand::parse("cancel_order", json!({})).expect_err("not a tool");
        assert!(matches!(error, ToolError::UnknownTool(ref name) if name == "cancel_order"));
    }

    #[test]
    fn names_round_trip_through_parse() {
        for name in TOOL_NAMES {
            let arguments = if name == "add_to_cart" {
                json!({"item_name": "soup"})
            } else {
                json!({})
            };
            let command = ToolCommand::parse(name, arguments).expect("known tool");
            assert_eq!(command.name(), name);
        }
    }
}
