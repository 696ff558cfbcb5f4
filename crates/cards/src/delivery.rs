//! Delivery preferences and how they translate into card classes.

use serde::{Deserialize, Serialize};

use cardissue_core::{DomainError, DomainResult};

use crate::card::CardClass;

/// Which delivery channels the customer accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPreference {
    pub physical: bool,
    #[serde(rename = "virtual")]
    pub digital: bool,
}

impl DeliveryPreference {
    pub fn virtual_only() -> Self {
        Self {
            physical: false,
            digital: true,
        }
    }

    pub fn physical_only() -> Self {
        Self {
            physical: true,
            digital: false,
        }
    }

    pub fn both() -> Self {
        Self {
            physical: true,
            digital: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.physical && !self.digital
    }
}

/// Decide which card classes to issue.
///
/// - one card: `VIRTUAL` when virtual delivery is enabled, else `PHYSICAL`
/// - two cards: one of each when both are enabled, otherwise two of the enabled class
pub fn plan_card_classes(
    delivery: DeliveryPreference,
    count: u8,
) -> DomainResult<Vec<CardClass>> {
    if delivery.is_empty() {
        return Err(DomainError::invalid_argument(
            "at least one delivery channel must be enabled",
        ));
    }

    match count {
        1 if delivery.digital => Ok(vec![CardClass::Virtual]),
        1 => Ok(vec![CardClass::Physical]),
        2 => {
            let mut classes = Vec::with_capacity(2);
            if delivery.digital {
                classes.push(CardClass::Virtual);
            }
            if delivery.physical {
                classes.push(CardClass::Physical);
            }
            if classes.len() == 1 {
                classes.push(classes[0]);
            }
            Ok(classes)
        }
        other => Err(DomainError::invalid_argument(format!(
            "card count must be 1 or 2, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_card_prefers_virtual() {
        assert_eq!(
            plan_card_classes(DeliveryPreference::both(), 1).unwrap(),
            vec![CardClass::Virtual]
        );
        assert_eq!(
            plan_card_classes(DeliveryPreference::physical_only(), 1).unwrap(),
            vec![CardClass::Physical]
        );
    }

    #[test]
    fn two_cards_split_across_enabled_channels() {
        assert_eq!(
            plan_card_classes(DeliveryPreference::both(), 2).unwrap(),
            vec![CardClass::Virtual, CardClass::Physical]
        );
        assert_eq!(
            plan_card_classes(DeliveryPreference::virtual_only(), 2).unwrap(),
            vec![CardClass::Virtual, CardClass::Virtual]
        );
        assert_eq!(
            plan_card_classes(DeliveryPreference::physical_only(), 2).unwrap(),
            vec![CardClass::Physical, CardClass::Physical]
        );
    }

    #[test]
    fn rejects_bad_count_and_empty_delivery() {
        assert!(plan_card_classes(DeliveryPreference::both(), 0).is_err());
        assert!(plan_card_classes(DeliveryPreference::both(), 3).is_err());
        assert!(plan_card_classes(DeliveryPreference::default(), 1).is_err());
    }

    #[test]
    fn deserializes_virtual_field_name() {
        let pref: DeliveryPreference =
            serde_json::from_str(r#"{"physical":false,"virtual":true}"#).unwrap();
        assert_eq!(pref, DeliveryPreference::virtual_only());
    }
}
