use chrono::{Duration, NaiveDate, NaiveDateTime};
use lending_ops::engine::{
    classify, Agent, AgentId, Application, ApplicationId, Category, Fillial, FillialId, Merchant,
    MerchantId, Payment, Product,
};
use lending_ops::repository::Dataset;
use std::collections::BTreeSet;

const STATUSES: [&str; 12] = [
    "NEW",
    "CONFIRMED",
    "FINISHED",
    "ACTIVE",
    "SCORING RAD ETDI",
    "LIMIT",
    "WAITING_FOR_CONTRACT",
    "CANCELED_BY_CLIENT",
    "COMPLETED",
    "PROCESSING",
    "REFUSED",
    "ADDED_PRODUCT",
];

const CLIENTS: [(&str, &str, &str); 6] = [
    ("Aziza Karimova", "+998901112233", "AA1234567"),
    ("Bekzod Tursunov", "+998935554411", "AB7654321"),
    ("Dildora Rashidova", "+998977001020", "AC1122334"),
    ("Jasur Aliyev", "+998909998877", "AD5566778"),
    ("Nodira Usmonova", "+998946667788", "AE9988776"),
    ("Sardor Ergashev", "+998971234000", "AF3344556"),
];

const PRODUCTS: [(&str, i64); 4] = [
    ("Smartphone", 2_400_000),
    ("Washing machine", 4_100_000),
    ("Laptop", 7_800_000),
    ("Air conditioner", 5_300_000),
];

const TERMS: [u32; 4] = [3, 6, 9, 12];
const PAYMENT_METHODS: [&str; 3] = ["CARD", "CASH", "UZCARD"];
const MARKUP_PERCENT: i64 = 28;

fn demo_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 8)
        .and_then(|date| date.and_hms_opt(10, 0, 0))
        .unwrap_or_default()
}

/// Deterministic sample portfolio used when no dataset is configured.
pub(crate) fn demo_dataset() -> Dataset {
    let merchants = vec![
        Merchant {
            id: MerchantId(10),
            name: "Artel".to_string(),
        },
        Merchant {
            id: MerchantId(20),
            name: "Mediapark".to_string(),
        },
        Merchant {
            id: MerchantId(30),
            name: "Texnomart".to_string(),
        },
    ];

    let fillials = vec![
        fillial(1, "Tashkent", 10, Some("Artel Chilonzor")),
        fillial(2, "Tashkent", 20, Some("Mediapark Yunusobod")),
        fillial(3, "Samarkand", 10, Some("Artel Registon")),
        fillial(4, "Bukhara", 30, Some("Texnomart Markaz")),
        fillial(5, "Fergana", 30, None),
    ];

    let agents = vec![
        Agent {
            id: AgentId(1),
            name: Some("Dilshod".to_string()),
            fillial_ids: BTreeSet::from([FillialId(1), FillialId(3)]),
        },
        Agent {
            id: AgentId(2),
            name: Some("Malika".to_string()),
            fillial_ids: BTreeSet::from([FillialId(2), FillialId(4), FillialId(5)]),
        },
    ];

    let applications = (1..=24u64).map(demo_application).collect();

    Dataset {
        applications,
        fillials,
        merchants,
        agents,
    }
}

fn fillial(id: u64, region: &str, merchant: u64, name: Option<&str>) -> Fillial {
    Fillial {
        id: FillialId(id),
        region: region.to_string(),
        merchant_id: MerchantId(merchant),
        name: name.map(str::to_string),
    }
}

fn demo_application(id: u64) -> Application {
    let index = id as usize;
    let raw_status = STATUSES[(index - 1) % STATUSES.len()].to_string();
    let (full_name, phone, passport) = CLIENTS[index % CLIENTS.len()];
    let (product, price) = PRODUCTS[index % PRODUCTS.len()];
    let count = 1 + (id % 2) as u32;
    let amount = price * i64::from(count);
    let term = TERMS[index % TERMS.len()];
    let created_at = demo_epoch() + Duration::days(5 * id as i64) + Duration::hours((id % 8) as i64);

    let finished = classify(&raw_status) == Category::Finished;
    let payment_amount = finished.then(|| amount * (100 + MARKUP_PERCENT) / 100);
    let paid = finished && id % 2 == 0;

    let payments = match payment_amount {
        Some(total) => {
            let installment = total / i64::from(term);
            (1..=(id % 4))
                .map(|month| Payment {
                    amount: installment,
                    occurred_at: created_at + Duration::days(30 * month as i64),
                    status: Some(if month == 3 { "FAILED" } else { "SUCCESS" }.to_string()),
                })
                .collect()
        }
        None => Vec::new(),
    };

    Application {
        id: ApplicationId(id),
        raw_status,
        amount: Some(amount),
        payment_amount,
        percent: Some(MARKUP_PERCENT as f64),
        term_months: Some(term),
        created_at,
        fillial_id: FillialId(id % 5 + 1),
        paid,
        payment_method: paid.then(|| PAYMENT_METHODS[index % PAYMENT_METHODS.len()].to_string()),
        full_name: Some(full_name.to_string()),
        phone: Some(phone.to_string()),
        passport: Some(passport.to_string()),
        products: vec![Product {
            name: product.to_string(),
            price,
            count,
        }],
        payments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lending_ops::repository::ApplicationRepository;

    #[test]
    fn demo_dataset_is_internally_consistent() {
        let dataset = demo_dataset();
        let directory = dataset.directory().expect("directory builds");

        assert_eq!(dataset.applications.len(), 24);
        for application in &dataset.applications {
            assert!(directory.fillial(application.fillial_id).is_some());
            assert_eq!(application.principal(), application.products_total());
        }
        assert!(dataset
            .applications
            .iter()
            .any(|application| application.paid && application.payment_method.is_some()));
    }
}
