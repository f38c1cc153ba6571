//! Variant selection and retail pricing.

use super::{CatalogVariant, PrintifyClient, PrintifyError};
use crate::config::{ListingSettings, VariantSelection, MAX_SELECTED_VARIANTS};

/// Assumed provider cost when the catalog does not report one.
pub const DEFAULT_COST_CENTS: u32 = 1000;

/// Retail price in cents.
///
/// A fixed `base_price` (currency units) wins; otherwise the provider cost
/// is marked up by `profit_percent`.
pub fn calculate_price(cost_cents: Option<u32>, base_price: Option<f64>, profit_percent: f64) -> u32 {
    if let Some(base) = base_price {
        return (base * 100.0).round().max(0.0) as u32;
    }
    let cost = f64::from(cost_cents.unwrap_or(DEFAULT_COST_CENTS));
    (cost * (1.0 + profit_percent / 100.0)).round().max(0.0) as u32
}

/// Fill in prices left at 0 in a user selection.
pub fn price_selection(
    selected: &[VariantSelection],
    settings: &ListingSettings,
) -> Result<Vec<VariantSelection>, PrintifyError> {
    if selected.len() > MAX_SELECTED_VARIANTS {
        return Err(PrintifyError::TooManyVariants(MAX_SELECTED_VARIANTS));
    }

    Ok(selected
        .iter()
        .map(|v| VariantSelection {
            variant_id: v.variant_id,
            enabled: v.enabled,
            price: if v.price > 0 {
                v.price
            } else {
                calculate_price(None, settings.base_price, settings.profit_percent)
            },
        })
        .collect())
}

/// Enable the first catalog variants, priced from the listing settings.
pub fn selection_from_catalog(
    catalog: &[CatalogVariant],
    settings: &ListingSettings,
) -> Vec<VariantSelection> {
    catalog
        .iter()
        .take(MAX_SELECTED_VARIANTS)
        .map(|v| VariantSelection {
            variant_id: v.id,
            enabled: true,
            price: v.price.filter(|p| *p > 0).unwrap_or_else(|| {
                calculate_price(v.cost, settings.base_price, settings.profit_percent)
            }),
        })
        .collect()
}

/// The priced variants to create a draft with.
///
/// With nothing selected, the provider's catalog is fetched and its first
/// variants are used.
pub async fn ensure_variant_selection(
    client: &PrintifyClient,
    settings: &ListingSettings,
) -> Result<Vec<VariantSelection>, PrintifyError> {
    if !settings.selected_variants.is_empty() {
        return price_selection(&settings.selected_variants, settings);
    }

    let catalog = client
        .get_variants(settings.blueprint_id, settings.print_provider_id)
        .await?;
    tracing::debug!(
        "No variants selected; using {} of {} catalog variants",
        catalog.len().min(MAX_SELECTED_VARIANTS),
        catalog.len()
    );
    Ok(selection_from_catalog(&catalog, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn variant(id: u64, price: Option<u32>, cost: Option<u32>) -> CatalogVariant {
        CatalogVariant {
            id,
            price,
            cost,
            extra: Map::new(),
        }
    }

    #[test]
    fn base_price_wins() {
        assert_eq!(calculate_price(Some(1500), Some(24.99), 30.0), 2499);
    }

    #[test]
    fn margin_on_cost() {
        assert_eq!(calculate_price(Some(1150), None, 30.0), 1495);
        assert_eq!(calculate_price(None, None, 30.0), 1300);
        assert_eq!(calculate_price(Some(1000), None, 0.0), 1000);
    }

    #[test]
    fn zero_prices_are_filled() {
        let settings = ListingSettings {
            base_price: Some(19.5),
            ..Default::default()
        };
        let selected = vec![
            VariantSelection {
                variant_id: 1,
                enabled: true,
                price: 0,
            },
            VariantSelection {
                variant_id: 2,
                enabled: false,
                price: 2200,
            },
        ];
        let priced = price_selection(&selected, &settings).unwrap();
        assert_eq!(priced[0].price, 1950);
        assert_eq!(priced[1].price, 2200);
        assert!(!priced[1].enabled);
    }

    #[test]
    fn oversized_selection_is_an_error() {
        let selected: Vec<_> = (0..101)
            .map(|i| VariantSelection {
                variant_id: i,
                enabled: true,
                price: 1999,
            })
            .collect();
        let err = price_selection(&selected, &ListingSettings::default()).unwrap_err();
        assert!(matches!(err, PrintifyError::TooManyVariants(100)));
    }

    #[test]
    fn catalog_selection_is_capped_and_priced() {
        let catalog: Vec<_> = (0..150)
            .map(|i| variant(i, None, Some(1200)))
            .chain(std::iter::once(variant(999, Some(2500), None)))
            .collect();
        let selection = selection_from_catalog(&catalog, &ListingSettings::default());
        assert_eq!(selection.len(), 100);
        assert!(selection.iter().all(|v| v.enabled && v.price == 1560));

        let explicit = selection_from_catalog(&[variant(7, Some(2500), Some(1000))], &ListingSettings::default());
        assert_eq!(explicit[0].price, 2500);
    }
}
