// Regional databases (Korea, Japan, US, Taiwan)
pub mod applications;
pub mod campaigns;
pub mod companies;
pub mod point_transactions;
pub mod user_profiles;
pub mod video_submissions;
pub mod withdrawals;

// Biz database
pub mod creator_points;
pub mod creator_withdrawal_requests;
pub mod email_templates;
pub mod expense_records;
pub mod faqs;
pub mod featured_creators;
pub mod notifications;
pub mod page_contents;
pub mod receivables;
pub mod revenue_records;
pub mod seo_settings;
pub mod site_settings;
pub mod system_settings;

pub use applications::Entity as Applications;
pub use campaigns::Entity as Campaigns;
pub use companies::Entity as Companies;
pub use creator_points::Entity as CreatorPoints;
pub use creator_withdrawal_requests::Entity as CreatorWithdrawalRequests;
pub use featured_creators::Entity as FeaturedCreators;
pub use point_transactions::Entity as PointTransactions;
pub use user_profiles::Entity as UserProfiles;
pub use video_submissions::Entity as VideoSubmissions;
pub use withdrawals::Entity as Withdrawals;
