mod portfolio;
mod search;

pub use portfolio::{CreatePortfolio, DeleteParams, NewPortfolio, Portfolio, PortfolioResponse, UpdatePortfolio};
pub use search::{
    ExistsQuery, ExistsResponse, Pagination, PortfolioSearchResponse, SearchQuery,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
