//! Per-mode views of a product record
//!
//! Every job kind reads the same `ProductRecord`; only the projection differs.

use crate::extract::{ExtractionError, ProductRecord};
use serde::Serialize;

/// Number of competitor offers reported in repricing mode
pub const COMPETITOR_SLOTS: usize = 3;

/// Which offer's price is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePolicy {
    /// The cheapest offer
    Lowest,
    /// The offer the page features by default, as a shopper would see it
    Featured,
}

/// Shape of the records a job produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    FullDetail,
    PriceCheck,
    Repricing,
    ListingPrice,
}

impl OutputMode {
    pub fn price_policy(&self) -> PricePolicy {
        match self {
            Self::FullDetail | Self::Repricing | Self::ListingPrice => PricePolicy::Lowest,
            Self::PriceCheck => PricePolicy::Featured,
        }
    }

    /// Only full-detail records carry re-hosted images
    pub fn wants_images(&self) -> bool {
        matches!(self, Self::FullDetail)
    }

    pub fn competitor_slots(&self) -> usize {
        match self {
            Self::Repricing => COMPETITOR_SLOTS,
            _ => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullDetail => "full_detail",
            Self::PriceCheck => "price_check",
            Self::Repricing => "repricing",
            Self::ListingPrice => "listing_price",
        }
    }
}

/// Another seller's offer on the same product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorOffer {
    pub seller: String,
    pub price: f64,
    pub shipping_cost: f64,
}

/// Caller-facing record, one variant per output mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProductView {
    FullDetail {
        url: String,
        ean: Option<String>,
        title: String,
        brand: Option<String>,
        category: Option<String>,
        description: Option<String>,
        price: f64,
        shipping_cost: f64,
        seller: Option<String>,
        /// One slot per source image; `None` where re-hosting failed
        images: Vec<Option<String>>,
    },
    PriceCheck {
        url: String,
        ean: Option<String>,
        seller: String,
        price: f64,
        shipping_cost: f64,
    },
    Repricing {
        url: String,
        ean: Option<String>,
        seller: String,
        price: f64,
        shipping_cost: f64,
        competitors: Vec<CompetitorOffer>,
    },
    ListingPrice {
        url: String,
        ean: Option<String>,
        title: Option<String>,
        seller: Option<String>,
        price: f64,
        shipping_cost: f64,
    },
}

impl ProductView {
    pub fn url(&self) -> &str {
        match self {
            Self::FullDetail { url, .. }
            | Self::PriceCheck { url, .. }
            | Self::Repricing { url, .. }
            | Self::ListingPrice { url, .. } => url,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            Self::FullDetail { price, .. }
            | Self::PriceCheck { price, .. }
            | Self::Repricing { price, .. }
            | Self::ListingPrice { price, .. } => *price,
        }
    }
}

/// Projects a record into the view for `mode`
///
/// # Arguments
///
/// * `record` - The canonical record
/// * `mode` - Output mode of the job
/// * `images` - Re-hosted image slots; ignored outside full-detail mode
///
/// # Returns
///
/// * `Err(ExtractionError::NoPriceResolved)` - No selling price under the mode's policy
/// * `Err(ExtractionError::MissingRequiredField)` - A field the mode needs is absent
pub fn project(
    record: &ProductRecord,
    mode: OutputMode,
    images: Vec<Option<String>>,
) -> Result<ProductView, ExtractionError> {
    let policy = mode.price_policy();
    let price = record
        .selling_price(policy)
        .ok_or(ExtractionError::NoPriceResolved)?;
    let offer = record.selling_offer(policy);
    let seller = offer.map(|o| o.seller.clone());
    let shipping_cost = offer.map(|o| o.shipping_cost).unwrap_or(0.0);

    let view = match mode {
        OutputMode::FullDetail => ProductView::FullDetail {
            url: record.url.clone(),
            ean: record.ean.clone(),
            title: record
                .title
                .clone()
                .ok_or(ExtractionError::MissingRequiredField("title"))?,
            brand: record.brand.clone(),
            category: record.category_display(),
            description: record.description.clone(),
            price,
            shipping_cost,
            seller,
            images,
        },
        OutputMode::PriceCheck => ProductView::PriceCheck {
            url: record.url.clone(),
            ean: record.ean.clone(),
            seller: seller.ok_or(ExtractionError::MissingRequiredField("seller"))?,
            price,
            shipping_cost,
        },
        OutputMode::Repricing => ProductView::Repricing {
            url: record.url.clone(),
            ean: record.ean.clone(),
            seller: seller.ok_or(ExtractionError::MissingRequiredField("seller"))?,
            price,
            shipping_cost,
            competitors: record
                .competitors(policy, mode.competitor_slots())
                .into_iter()
                .map(|o| CompetitorOffer {
                    seller: o.seller.clone(),
                    price: o.price,
                    shipping_cost: o.shipping_cost,
                })
                .collect(),
        },
        OutputMode::ListingPrice => ProductView::ListingPrice {
            url: record.url.clone(),
            ean: record.ean.clone(),
            title: record.title.clone(),
            seller,
            price,
            shipping_cost,
        },
    };

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Offer, RecordSource};

    fn offer(id: &str, seller: &str, price: f64, buybox: bool) -> Offer {
        Offer {
            offer_id: id.to_string(),
            seller: seller.to_string(),
            price,
            shipping_cost: 1.0,
            is_buybox: buybox,
        }
    }

    fn record(offers: Vec<Offer>) -> ProductRecord {
        ProductRecord {
            url: "https://www.carrefour.fr/p/cafe-3017620422003".to_string(),
            product_id: Some("3017620422003".to_string()),
            ean: Some("3017620422003".to_string()),
            title: Some("Café moulu".to_string()),
            brand: Some("Carte Noire".to_string()),
            category_path: vec!["Épicerie".to_string(), "Café".to_string()],
            description: None,
            image_urls: Vec::new(),
            offers,
            fallback_price: None,
            source: RecordSource::EmbeddedState,
        }
    }

    fn market() -> ProductRecord {
        record(vec![
            offer("B", "Shop B", 4.0, false),
            offer("C", "Shop C", 4.5, false),
            offer("A", "Shop A", 5.0, true),
            offer("D", "Shop D", 6.0, false),
            offer("E", "Shop E", 7.0, false),
        ])
    }

    #[test]
    fn test_mode_policies() {
        assert_eq!(OutputMode::FullDetail.price_policy(), PricePolicy::Lowest);
        assert_eq!(OutputMode::ListingPrice.price_policy(), PricePolicy::Lowest);
        assert_eq!(OutputMode::PriceCheck.price_policy(), PricePolicy::Featured);
        assert_eq!(OutputMode::Repricing.price_policy(), PricePolicy::Lowest);
        assert!(OutputMode::FullDetail.wants_images());
        assert!(!OutputMode::Repricing.wants_images());
    }

    #[test]
    fn test_full_detail_uses_lowest_offer() {
        let view = project(&market(), OutputMode::FullDetail, vec![None]).unwrap();
        match view {
            ProductView::FullDetail {
                price,
                seller,
                category,
                images,
                ..
            } => {
                assert_eq!(price, 4.0);
                assert_eq!(seller.as_deref(), Some("Shop B"));
                assert_eq!(category.as_deref(), Some("Épicerie > Café"));
                assert_eq!(images, vec![None]);
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_price_check_uses_featured_offer() {
        let view = project(&market(), OutputMode::PriceCheck, Vec::new()).unwrap();
        assert_eq!(view.price(), 5.0);
        assert!(matches!(
            view,
            ProductView::PriceCheck { ref seller, .. } if seller == "Shop A"
        ));
    }

    #[test]
    fn test_repricing_lists_three_competitors() {
        let view = project(&market(), OutputMode::Repricing, Vec::new()).unwrap();
        let ProductView::Repricing {
            seller,
            price,
            competitors,
            ..
        } = view
        else {
            panic!("expected repricing view");
        };

        assert_eq!(seller, "Shop B");
        assert_eq!(price, 4.0);
        let sellers: Vec<&str> = competitors.iter().map(|c| c.seller.as_str()).collect();
        assert_eq!(sellers, vec!["Shop C", "Shop A", "Shop D"]);
    }

    #[test]
    fn test_repricing_keeps_featured_offer_as_competitor() {
        let reported = market();
        let ids: Vec<&str> = reported
            .competitors(PricePolicy::Lowest, COMPETITOR_SLOTS)
            .iter()
            .map(|o| o.offer_id.as_str())
            .collect();
        assert_eq!(ids, vec!["C", "A", "D"]);

        let ids: Vec<&str> = reported
            .competitors(PricePolicy::Featured, COMPETITOR_SLOTS)
            .iter()
            .map(|o| o.offer_id.as_str())
            .collect();
        assert_eq!(ids, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_full_detail_requires_title() {
        let mut untitled = market();
        untitled.title = None;
        assert_eq!(
            project(&untitled, OutputMode::FullDetail, Vec::new()),
            Err(ExtractionError::MissingRequiredField("title"))
        );
        // Listing price tolerates a missing title
        assert!(project(&untitled, OutputMode::ListingPrice, Vec::new()).is_ok());
    }

    #[test]
    fn test_fallback_record_has_no_seller() {
        let mut fallback = record(Vec::new());
        fallback.fallback_price = Some(2.5);
        fallback.source = RecordSource::HtmlFallback;

        assert_eq!(
            project(&fallback, OutputMode::PriceCheck, Vec::new()),
            Err(ExtractionError::MissingRequiredField("seller"))
        );
        let listing = project(&fallback, OutputMode::ListingPrice, Vec::new()).unwrap();
        assert_eq!(listing.price(), 2.5);
    }

    #[test]
    fn test_no_price() {
        assert_eq!(
            project(&record(Vec::new()), OutputMode::ListingPrice, Vec::new()),
            Err(ExtractionError::NoPriceResolved)
        );
    }

    #[test]
    fn test_view_is_tagged_by_mode() {
        let view = project(&market(), OutputMode::PriceCheck, Vec::new()).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["mode"], "price_check");
        assert_eq!(json["seller"], "Shop A");
    }
}
