//! SeaORM entity models
//!
//! Catalog tables read and written by the enrichment pipeline

mod peptide;
mod peptide_alias;
mod peptide_profile;
mod peptide_use_case;
mod dosing_entry;
mod safety_entry;
mod regulatory_status;
mod vendor;
mod vendor_listing;
mod vendor_rating_snapshot;
mod jurisdiction;
mod use_case;
mod citation;
mod claim;

pub use peptide::{
    Entity as PeptideEntity,
    Model as Peptide,
    ActiveModel as PeptideActiveModel,
    Column as PeptideColumn,
};

pub use peptide_alias::{
    Entity as PeptideAliasEntity,
    Model as PeptideAlias,
    ActiveModel as PeptideAliasActiveModel,
    Column as PeptideAliasColumn,
};

pub use peptide_profile::{
    Entity as PeptideProfileEntity,
    Model as PeptideProfile,
    ActiveModel as PeptideProfileActiveModel,
    Column as PeptideProfileColumn,
};

pub use peptide_use_case::{
    Entity as PeptideUseCaseEntity,
    Model as PeptideUseCase,
    ActiveModel as PeptideUseCaseActiveModel,
    Column as PeptideUseCaseColumn,
};

pub use dosing_entry::{
    Entity as DosingEntryEntity,
    Model as DosingEntry,
    ActiveModel as DosingEntryActiveModel,
    Column as DosingEntryColumn,
};

pub use safety_entry::{
    Entity as SafetyEntryEntity,
    Model as SafetyEntry,
    ActiveModel as SafetyEntryActiveModel,
    Column as SafetyEntryColumn,
};

pub use regulatory_status::{
    Entity as RegulatoryStatusEntity,
    Model as RegulatoryStatusRow,
    ActiveModel as RegulatoryStatusActiveModel,
    Column as RegulatoryStatusColumn,
};

pub use vendor::{
    Entity as VendorEntity,
    Model as Vendor,
    ActiveModel as VendorActiveModel,
    Column as VendorColumn,
};

pub use vendor_listing::{
    Entity as VendorListingEntity,
    Model as VendorListing,
    ActiveModel as VendorListingActiveModel,
    Column as VendorListingColumn,
};

pub use vendor_rating_snapshot::{
    Entity as VendorRatingSnapshotEntity,
    Model as VendorRatingSnapshot,
    ActiveModel as VendorRatingSnapshotActiveModel,
    Column as VendorRatingSnapshotColumn,
};

pub use jurisdiction::{
    Entity as JurisdictionEntity,
    Model as Jurisdiction,
    ActiveModel as JurisdictionActiveModel,
    Column as JurisdictionColumn,
};

pub use use_case::{
    Entity as UseCaseEntity,
    Model as UseCase,
    ActiveModel as UseCaseActiveModel,
    Column as UseCaseColumn,
};

pub use citation::{
    Entity as CitationEntity,
    Model as Citation,
    ActiveModel as CitationActiveModel,
    Column as CitationColumn,
};

pub use claim::{
    Entity as ClaimEntity,
    Model as Claim,
    ActiveModel as ClaimActiveModel,
    Column as ClaimColumn,
};
